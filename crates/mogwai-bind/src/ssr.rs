//! Server-side rendered views.
//!
//! [`SsrNode`] is a small in-memory DOM. It supports everything [`ViewNode`] asks
//! for, renders to an HTML string and, since there is no layout engine, lets callers
//! assign element heights with [`SsrNode::set_layout_height`].
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::{
    animate::{ListAnimator, SteppingClock, VerticalListEaseOut},
    builder::{Child, Content},
    str::{Str, class_tokens},
    view::{EventHandler, NodeKey, NodeKind, ViewNode},
};

thread_local! {
    static NEXT_KEY: Cell<u64> = const { Cell::new(0) };
}

fn next_key() -> NodeKey {
    NEXT_KEY.with(|next| {
        let key = next.get();
        next.set(key + 1);
        NodeKey(key)
    })
}

/// An event delivered by [`SsrNode::dispatch_event`].
#[derive(Clone, Debug)]
pub struct SsrEvent {
    pub name: Str,
    pub target: SsrNode,
}

struct SsrInner {
    key: NodeKey,
    kind: NodeKind,
    name: Str,
    text: RefCell<String>,
    attributes: RefCell<Vec<(Str, Str)>>,
    styles: RefCell<Vec<(Str, Str)>>,
    handlers: RefCell<Vec<(Str, EventHandler<SsrEvent>)>>,
    children: RefCell<Vec<SsrNode>>,
    parent: RefCell<Weak<SsrInner>>,
    layout_height: Cell<Option<f64>>,
}

/// A node in an in-memory document.
#[derive(Clone)]
pub struct SsrNode {
    inner: Rc<SsrInner>,
}

impl PartialEq for SsrNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SsrNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.kind {
            NodeKind::Element => write!(f, "<{}>#{}", self.inner.name, self.inner.key.0),
            NodeKind::Text => write!(f, "{:?}#{}", self.inner.text.borrow(), self.inner.key.0),
            NodeKind::Comment => write!(f, "<!--{}-->#{}", self.inner.text.borrow(), self.inner.key.0),
            NodeKind::Fragment => write!(f, "fragment#{}", self.inner.key.0),
        }
    }
}

fn valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        }
        _ => false,
    }
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").trim().parse().ok()
}

fn escape(text: &str, escape_quotes: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if escape_quotes => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl SsrNode {
    fn new(kind: NodeKind, name: &str, text: &str) -> Self {
        let key = next_key();
        log::trace!("creating {kind:?} node {key:?}");
        SsrNode {
            inner: Rc::new(SsrInner {
                key,
                kind,
                name: name.to_owned().into(),
                text: RefCell::new(text.to_owned()),
                attributes: Default::default(),
                styles: Default::default(),
                handlers: Default::default(),
                children: Default::default(),
                parent: Default::default(),
                layout_height: Default::default(),
            }),
        }
    }

    /// The tag name of an element, empty for other nodes.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Assign the height an element would have after layout.
    pub fn set_layout_height(&self, height: f64) {
        self.inner.layout_height.set(Some(height));
    }

    /// Attribute names and values, in the order they were first set.
    pub fn attributes(&self) -> Vec<(Str, Str)> {
        self.inner.attributes.borrow().clone()
    }

    /// Call the handler assigned to `on{name}`, returning whether there was one.
    pub fn dispatch_event(&self, name: &str) -> bool {
        let property = format!("on{name}");
        let may_handler = self
            .inner
            .handlers
            .borrow()
            .iter()
            .find(|(key, _)| *key == property)
            .map(|(_, handler)| handler.clone());
        if let Some(handler) = may_handler {
            handler(&SsrEvent {
                name: name.to_owned().into(),
                target: self.clone(),
            });
            true
        } else {
            false
        }
    }

    fn set_parent(&self, parent: Option<&SsrNode>) {
        *self.inner.parent.borrow_mut() = parent.map(|p| Rc::downgrade(&p.inner)).unwrap_or_default();
    }

    fn index_of(&self, child: &SsrNode) -> Option<usize> {
        self.inner.children.borrow().iter().position(|c| c == child)
    }

    fn is_inclusive_ancestor_of(&self, node: &SsrNode) -> bool {
        let mut may_node = Some(node.clone());
        while let Some(node) = may_node {
            if &node == self {
                return true;
            }
            may_node = node.parent();
        }
        false
    }

    /// Prepare `node` for insertion, returning the nodes that actually get inserted.
    ///
    /// Fragments give up their children. Everything else leaves its current parent.
    fn take_for_insert(&self, node: &SsrNode) -> Option<Vec<SsrNode>> {
        if node.is_inclusive_ancestor_of(self) {
            log::error!("cannot insert {node:?} into its own descendant {self:?}");
            return None;
        }
        if node.inner.kind == NodeKind::Fragment {
            let children = std::mem::take(&mut *node.inner.children.borrow_mut());
            for child in children.iter() {
                child.set_parent(None);
            }
            Some(children)
        } else {
            node.detach();
            Some(vec![node.clone()])
        }
    }

    fn splice_children(&self, index: usize, nodes: Vec<SsrNode>) {
        for node in nodes.iter() {
            node.set_parent(Some(self));
        }
        self.inner
            .children
            .borrow_mut()
            .splice(index..index, nodes);
    }

    fn clear_children(&self) {
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            child.set_parent(None);
        }
    }

    fn has_display_none(&self) -> bool {
        self.get_style("display").as_deref() == Some("none")
    }

    /// Render this node and its descendants as HTML.
    pub fn html_string(&self) -> String {
        // Only certain elements can be "void", written as <tag /> when they have no
        // children. Writing other elements in void notation confuses parsers.
        fn tag_is_voidable(tag: &str) -> bool {
            matches!(
                tag,
                "area"
                    | "base"
                    | "br"
                    | "col"
                    | "hr"
                    | "img"
                    | "input"
                    | "link"
                    | "meta"
                    | "param"
                    | "command"
                    | "keygen"
                    | "source"
            )
        }

        let kids = || {
            self.inner
                .children
                .borrow()
                .iter()
                .map(SsrNode::html_string)
                .collect::<Vec<_>>()
                .join("")
        };

        match self.inner.kind {
            NodeKind::Text => escape(&self.inner.text.borrow(), false),
            NodeKind::Comment => format!("<!--{}-->", self.inner.text.borrow()),
            NodeKind::Fragment => kids(),
            NodeKind::Element => {
                let name = &self.inner.name;
                let mut attributes = self.inner.attributes.borrow().clone();
                let styles = self.inner.styles.borrow();
                if !styles.is_empty() {
                    let styles = styles
                        .iter()
                        .map(|(k, v)| format!("{k}: {v};"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    if let Some((_, value)) = attributes.iter_mut().find(|(k, _)| k == "style") {
                        *value = format!("{value} {styles}").into();
                    } else {
                        attributes.push(("style".into(), styles.into()));
                    }
                }
                let atts = attributes
                    .iter()
                    .map(|(key, value)| format!(r#" {}="{}""#, key, escape(value, true)))
                    .collect::<String>();

                let children = kids();
                if children.is_empty() && tag_is_voidable(name) {
                    format!("<{name}{atts} />")
                } else {
                    format!("<{name}{atts}>{children}</{name}>")
                }
            }
        }
    }
}

impl ViewNode for SsrNode {
    type Event = SsrEvent;

    fn element(tag: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(valid_tag_name(tag), "invalid tag name {tag:?}");
        Ok(SsrNode::new(NodeKind::Element, tag, ""))
    }

    fn text(text: &str) -> Self {
        SsrNode::new(NodeKind::Text, "", text)
    }

    fn comment(text: &str) -> Self {
        SsrNode::new(NodeKind::Comment, "", text)
    }

    fn fragment() -> Self {
        SsrNode::new(NodeKind::Fragment, "", "")
    }

    fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    fn key(&self) -> NodeKey {
        self.inner.key
    }

    fn parent(&self) -> Option<Self> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| SsrNode { inner })
    }

    fn child_nodes(&self) -> Vec<Self> {
        self.inner.children.borrow().clone()
    }

    fn append_child(&self, child: &Self) {
        if let Some(nodes) = self.take_for_insert(child) {
            let index = self.inner.children.borrow().len();
            self.splice_children(index, nodes);
        }
    }

    fn insert_before(&self, child: &Self, reference: Option<&Self>) {
        let Some(reference) = reference else {
            self.append_child(child);
            return;
        };
        if child == reference {
            return;
        }
        if self.index_of(reference).is_none() {
            log::error!("{reference:?} is not a child of {self:?}");
            return;
        }
        if let Some(nodes) = self.take_for_insert(child) {
            if let Some(index) = self.index_of(reference) {
                self.splice_children(index, nodes);
            }
        }
    }

    fn replace_child(&self, new_child: &Self, old_child: &Self) {
        if new_child == old_child {
            return;
        }
        if self.index_of(old_child).is_none() {
            log::error!("{old_child:?} is not a child of {self:?}");
            return;
        }
        if let Some(nodes) = self.take_for_insert(new_child) {
            if let Some(index) = self.index_of(old_child) {
                self.inner.children.borrow_mut().remove(index);
                old_child.set_parent(None);
                self.splice_children(index, nodes);
            }
        }
    }

    fn remove_child(&self, child: &Self) {
        match self.index_of(child) {
            Some(index) => {
                self.inner.children.borrow_mut().remove(index);
                child.set_parent(None);
            }
            None => log::error!("{child:?} is not a child of {self:?}"),
        }
    }

    fn text_content(&self) -> String {
        match self.inner.kind {
            NodeKind::Text | NodeKind::Comment => self.inner.text.borrow().clone(),
            NodeKind::Element | NodeKind::Fragment => self
                .inner
                .children
                .borrow()
                .iter()
                .filter(|child| child.inner.kind != NodeKind::Comment)
                .map(SsrNode::text_content)
                .collect(),
        }
    }

    fn set_text_content(&self, text: &str) {
        match self.inner.kind {
            NodeKind::Text | NodeKind::Comment => {
                *self.inner.text.borrow_mut() = text.to_owned();
            }
            NodeKind::Element | NodeKind::Fragment => {
                self.clear_children();
                if !text.is_empty() {
                    self.append_child(&SsrNode::text(text));
                }
            }
        }
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        self.inner
            .attributes
            .borrow()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    }

    fn set_attribute(&self, name: &str, value: &str) {
        let mut attributes = self.inner.attributes.borrow_mut();
        if let Some((_, prev)) = attributes.iter_mut().find(|(k, _)| k == name) {
            *prev = value.to_owned().into();
        } else {
            attributes.push((name.to_owned().into(), value.to_owned().into()));
        }
    }

    fn remove_attribute(&self, name: &str) {
        self.inner.attributes.borrow_mut().retain(|(k, _)| k != name);
    }

    fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|classes| class_tokens(&classes).any(|c| c == class))
    }

    fn add_class(&self, class: &str) {
        if class.is_empty() || self.has_class(class) {
            return;
        }
        let classes = match self.get_attribute("class") {
            Some(classes) if !classes.trim().is_empty() => format!("{} {class}", classes.trim_end()),
            _ => class.to_owned(),
        };
        self.set_attribute("class", &classes);
    }

    fn remove_class(&self, class: &str) {
        if let Some(classes) = self.get_attribute("class") {
            let remaining = class_tokens(&classes)
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ");
            if remaining.is_empty() {
                self.remove_attribute("class");
            } else {
                self.set_attribute("class", &remaining);
            }
        }
    }

    fn get_style(&self, property: &str) -> Option<String> {
        self.inner
            .styles
            .borrow()
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.to_string())
    }

    fn set_style(&self, property: &str, value: &str) {
        if value.is_empty() {
            self.remove_style(property);
            return;
        }
        let mut styles = self.inner.styles.borrow_mut();
        if let Some((_, prev)) = styles.iter_mut().find(|(k, _)| k == property) {
            *prev = value.to_owned().into();
        } else {
            styles.push((property.to_owned().into(), value.to_owned().into()));
        }
    }

    fn remove_style(&self, property: &str) {
        self.inner.styles.borrow_mut().retain(|(k, _)| k != property);
    }

    fn set_event_handler(&self, name: &str, handler: EventHandler<SsrEvent>) {
        let mut handlers = self.inner.handlers.borrow_mut();
        if let Some((_, prev)) = handlers.iter_mut().find(|(k, _)| k == name) {
            *prev = handler;
        } else {
            handlers.push((name.to_owned().into(), handler));
        }
    }

    fn client_height(&self) -> f64 {
        if self.inner.kind != NodeKind::Element {
            return 0.0;
        }
        self.get_style("height")
            .as_deref()
            .and_then(parse_px)
            .or(self.inner.layout_height.get())
            .unwrap_or(0.0)
    }

    fn is_visible(&self) -> bool {
        if self.parent().is_none() || self.client_height() <= 0.0 {
            return false;
        }
        let mut may_node = Some(self.clone());
        while let Some(node) = may_node {
            if node.has_display_none() {
                return false;
            }
            may_node = node.parent();
        }
        true
    }

    fn computed_opacity(&self) -> f64 {
        self.get_style("opacity")
            .and_then(|opacity| opacity.trim().parse().ok())
            .unwrap_or(1.0)
    }

    fn offset_parent(&self) -> Option<Self> {
        let mut may_node = self.parent();
        while let Some(node) = may_node {
            if node
                .get_style("position")
                .is_some_and(|position| position != "static")
            {
                return Some(node);
            }
            may_node = node.parent();
        }
        None
    }

    fn default_list_animator() -> Rc<dyn ListAnimator<Self>> {
        Rc::new(VerticalListEaseOut::new(SteppingClock::default()))
    }
}

impl From<SsrNode> for Child<SsrNode> {
    fn from(node: SsrNode) -> Self {
        Child::Node(node)
    }
}

impl From<&SsrNode> for Child<SsrNode> {
    fn from(node: &SsrNode) -> Self {
        Child::Node(node.clone())
    }
}

impl From<SsrNode> for Content<SsrNode> {
    fn from(node: SsrNode) -> Self {
        Content::Node(node)
    }
}
