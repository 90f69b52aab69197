//! Building node trees from descriptions.
//!
//! [`build`] takes a [`Descriptor`] (a tag name, a view unit constructor or a
//! function), some [`Attrs`] and a list of [`Child`]ren, and produces a node with all
//! of its bindings in place.
//!
//! Children are anything that converts into a [`Child`]. The [`children!`] macro
//! collects a heterogeneous list:
//!
//! ```rust
//! # #[cfg(feature = "ssr")]
//! # {
//! use mogwai_bind::{prelude::*, ssr::SsrNode};
//!
//! let name = Observable::new("Ada");
//! let p = build::<SsrNode>(
//!     "p",
//!     Attrs::new(),
//!     children!["Hello, ", name.clone(), "! You have ", 3, " messages."],
//! )
//! .unwrap()
//! .unwrap()
//! .node();
//! name.set("Grace");
//! assert_eq!(p.text_content(), "Hello, Grace! You have 3 messages.");
//! # }
//! ```
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use anyhow::Context;

use crate::{
    array::ObservableArray,
    bind::{Bind, bind_attribute},
    dispose::{Disposer, register_disposal, unregister_disposal},
    handlers::attribute_handler,
    observable::{Computed, Observable, Source, Subscription},
    reconcile::reconcile_list,
    str::Str,
    value::Value,
    view::{EventHandler, NodeKind, ViewNode, ViewUnit},
};

/// What an attribute is set to.
pub enum AttrValue<N: ViewNode> {
    /// A static, observable or derived value.
    Bind(Bind),
    /// An event handler, for attributes named `on*`.
    Handler(EventHandler<N::Event>),
    /// Inline style declarations.
    Style(Vec<(Str, Str)>),
}

impl<N: ViewNode> Clone for AttrValue<N> {
    fn clone(&self) -> Self {
        match self {
            AttrValue::Bind(bind) => AttrValue::Bind(bind.clone()),
            AttrValue::Handler(handler) => AttrValue::Handler(handler.clone()),
            AttrValue::Style(declarations) => AttrValue::Style(declarations.clone()),
        }
    }
}

impl<N: ViewNode> std::fmt::Debug for AttrValue<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Bind(bind) => f.debug_tuple("Bind").field(bind).finish(),
            AttrValue::Handler(_) => f.write_str("Handler"),
            AttrValue::Style(declarations) => f.debug_tuple("Style").field(declarations).finish(),
        }
    }
}

/// An ordered set of named attributes.
///
/// Setting a name twice replaces the earlier value in place.
pub struct Attrs<N: ViewNode> {
    attributes: Vec<(Str, AttrValue<N>)>,
}

impl<N: ViewNode> Default for Attrs<N> {
    fn default() -> Self {
        Attrs { attributes: vec![] }
    }
}

impl<N: ViewNode> Clone for Attrs<N> {
    fn clone(&self) -> Self {
        Attrs {
            attributes: self.attributes.clone(),
        }
    }
}

impl<N: ViewNode> std::fmt::Debug for Attrs<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.attributes.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<N: ViewNode> Attrs<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute to a value.
    pub fn with(self, name: impl Into<Str>, value: impl Into<Bind>) -> Self {
        self.with_value(name, AttrValue::Bind(value.into()))
    }

    /// Set an event handler property, ie `onclick`.
    pub fn on(self, name: impl Into<Str>, handler: impl Fn(&N::Event) + 'static) -> Self {
        self.with_value(name, AttrValue::Handler(Rc::new(handler)))
    }

    /// Set the `style` attribute to some declarations.
    pub fn with_style<K: Into<Str>, V: Into<Str>>(
        self,
        declarations: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let declarations = declarations
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.with_value("style", AttrValue::Style(declarations))
    }

    pub fn with_value(mut self, name: impl Into<Str>, value: AttrValue<N>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<Str>, value: AttrValue<N>) {
        let name = name.into();
        if let Some((_, prev)) = self.attributes.iter_mut().find(|(k, _)| *k == name) {
            *prev = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue<N>> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue<N>)> {
        self.attributes.iter().map(|(k, v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// The value of a reactive child.
#[derive(Clone, Debug, PartialEq)]
pub enum Content<N> {
    /// A node to display as-is.
    Node(N),
    /// A scalar to display as text.
    Value(Value),
}

impl<N> From<Value> for Content<N> {
    fn from(value: Value) -> Self {
        Content::Value(value)
    }
}

impl<N> From<&'static str> for Content<N> {
    fn from(s: &'static str) -> Self {
        Content::Value(s.into())
    }
}

impl<N> From<String> for Content<N> {
    fn from(s: String) -> Self {
        Content::Value(s.into())
    }
}

impl<N> From<Str> for Content<N> {
    fn from(s: Str) -> Self {
        Content::Value(s.into())
    }
}

impl<N> From<bool> for Content<N> {
    fn from(b: bool) -> Self {
        Content::Value(b.into())
    }
}

impl<N, T: Into<Value>> From<Option<T>> for Content<N> {
    fn from(may_t: Option<T>) -> Self {
        Content::Value(may_t.into())
    }
}

/// A child of a node under construction.
pub enum Child<N: ViewNode> {
    /// An element, fragment, comment or text node, appended as-is.
    Node(N),
    /// A view unit, its root node is appended.
    Unit(Rc<dyn ViewUnit<N>>),
    /// A scalar, appended as a text node.
    Value(Value),
    /// An observable the child follows. The child does not own it.
    Observable(Rc<dyn Source<Content<N>>>),
    /// A closure wrapped in a [`Computed`] that the child owns.
    Derived(Rc<dyn Fn() -> Content<N>>),
    /// An observable array of nodes, patched into the parent as it changes.
    List(ObservableArray<N>),
    /// Any number of children.
    Many(Vec<Child<N>>),
}

impl<N: ViewNode> Child<N> {
    pub fn unit(unit: impl ViewUnit<N> + 'static) -> Self {
        Child::Unit(Rc::new(unit))
    }

    /// A child derived from other observables.
    pub fn derived<X: Into<Content<N>>>(f: impl Fn() -> X + 'static) -> Self {
        Child::Derived(Rc::new(move || f().into()))
    }
}

macro_rules! value_child_impl {
    ($($ty:ty),*) => {
        $(
            impl<N: ViewNode> From<$ty> for Child<N> {
                fn from(value: $ty) -> Self {
                    Child::Value(value.into())
                }
            }

            impl<N> From<$ty> for Content<N> {
                fn from(value: $ty) -> Self {
                    Content::Value(value.into())
                }
            }
        )*
    };
}

value_child_impl!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<N: ViewNode> From<Value> for Child<N> {
    fn from(value: Value) -> Self {
        Child::Value(value)
    }
}

impl<N: ViewNode> From<&'static str> for Child<N> {
    fn from(s: &'static str) -> Self {
        Child::Value(s.into())
    }
}

impl<N: ViewNode> From<String> for Child<N> {
    fn from(s: String) -> Self {
        Child::Value(s.into())
    }
}

impl<N: ViewNode> From<Str> for Child<N> {
    fn from(s: Str) -> Self {
        Child::Value(s.into())
    }
}

impl<N: ViewNode> From<bool> for Child<N> {
    fn from(b: bool) -> Self {
        Child::Value(b.into())
    }
}

impl<N: ViewNode> From<()> for Child<N> {
    fn from(_: ()) -> Self {
        Child::Value(Value::Null)
    }
}

impl<N: ViewNode, T: Into<Value>> From<Option<T>> for Child<N> {
    fn from(may_t: Option<T>) -> Self {
        Child::Value(may_t.into())
    }
}

impl<N: ViewNode, T> From<Observable<T>> for Child<N>
where
    T: Clone + PartialEq + Into<Content<N>> + 'static,
{
    fn from(observable: Observable<T>) -> Self {
        Child::Observable(Rc::new(observable))
    }
}

impl<N: ViewNode, T> From<&Observable<T>> for Child<N>
where
    T: Clone + PartialEq + Into<Content<N>> + 'static,
{
    fn from(observable: &Observable<T>) -> Self {
        Child::Observable(Rc::new(observable.clone()))
    }
}

impl<N: ViewNode, T> From<Computed<T>> for Child<N>
where
    T: Clone + PartialEq + Into<Content<N>> + 'static,
{
    fn from(computed: Computed<T>) -> Self {
        Child::Observable(Rc::new(computed))
    }
}

/// Adapts a scalar source into a content source.
struct ValueContent(Rc<dyn Source<Value>>);

impl<N: 'static> Source<Content<N>> for ValueContent {
    fn current(&self) -> Content<N> {
        Content::Value(self.0.current())
    }

    fn subscribe_boxed(&self, mut f: Box<dyn FnMut(&Content<N>, &Content<N>)>) -> Subscription {
        self.0.subscribe_boxed(Box::new(move |new, old| {
            f(&Content::Value(new.clone()), &Content::Value(old.clone()))
        }))
    }
}

impl<N: ViewNode> From<Bind> for Child<N> {
    fn from(bind: Bind) -> Self {
        match bind {
            Bind::Static(value) => Child::Value(value),
            Bind::Observable(source) => Child::Observable(Rc::new(ValueContent(source))),
            Bind::Derived(f) => Child::Derived(Rc::new(move || Content::Value(f()))),
        }
    }
}

impl<N: ViewNode> From<ObservableArray<N>> for Child<N> {
    fn from(array: ObservableArray<N>) -> Self {
        Child::List(array)
    }
}

impl<N: ViewNode> From<&ObservableArray<N>> for Child<N> {
    fn from(array: &ObservableArray<N>) -> Self {
        Child::List(array.clone())
    }
}

impl<N: ViewNode, U: ViewUnit<N> + 'static> From<Rc<U>> for Child<N> {
    fn from(unit: Rc<U>) -> Self {
        Child::Unit(unit)
    }
}

impl<N: ViewNode, T: Into<Child<N>>> From<Vec<T>> for Child<N> {
    fn from(children: Vec<T>) -> Self {
        Child::Many(children.into_iter().map(Into::into).collect())
    }
}

/// Collect a heterogeneous list of children into a `Vec<Child<_>>`.
#[macro_export]
macro_rules! children {
    () => {
        ::std::vec::Vec::new()
    };
    ($($child:expr),+ $(,)?) => {
        ::std::vec![$($crate::builder::Child::from($child)),+]
    };
}

/// The result of a [`Descriptor::Function`].
pub enum Rendered<N: ViewNode> {
    Node(N),
    Unit(Rc<dyn ViewUnit<N>>),
    /// A document fragment holding the children passed to [`build`].
    Fragment,
    /// Nothing to build.
    Nothing,
}

type UnitConstructor<N> = dyn Fn(Attrs<N>, Vec<Child<N>>) -> anyhow::Result<Rc<dyn ViewUnit<N>>>;

/// What to build.
pub enum Descriptor<N: ViewNode> {
    /// An element with this tag name.
    Tag(Str),
    /// A view unit, constructed from the attributes and children.
    Unit(Rc<UnitConstructor<N>>),
    /// A function of the attributes.
    Function(Rc<dyn Fn(&Attrs<N>) -> Rendered<N>>),
}

impl<N: ViewNode> Clone for Descriptor<N> {
    fn clone(&self) -> Self {
        match self {
            Descriptor::Tag(tag) => Descriptor::Tag(tag.clone()),
            Descriptor::Unit(ctor) => Descriptor::Unit(ctor.clone()),
            Descriptor::Function(f) => Descriptor::Function(f.clone()),
        }
    }
}

impl<N: ViewNode> Descriptor<N> {
    pub fn unit<U: ViewUnit<N> + 'static>(
        ctor: impl Fn(Attrs<N>, Vec<Child<N>>) -> anyhow::Result<U> + 'static,
    ) -> Self {
        Descriptor::Unit(Rc::new(
            move |attrs: Attrs<N>, children: Vec<Child<N>>| -> anyhow::Result<Rc<dyn ViewUnit<N>>> {
                let unit: Rc<dyn ViewUnit<N>> = Rc::new(ctor(attrs, children)?);
                Ok(unit)
            },
        ))
    }

    pub fn function(f: impl Fn(&Attrs<N>) -> Rendered<N> + 'static) -> Self {
        Descriptor::Function(Rc::new(f))
    }
}

impl<N: ViewNode> From<&'static str> for Descriptor<N> {
    fn from(tag: &'static str) -> Self {
        Descriptor::Tag(tag.into())
    }
}

impl<N: ViewNode> From<String> for Descriptor<N> {
    fn from(tag: String) -> Self {
        Descriptor::Tag(tag.into())
    }
}

impl<N: ViewNode> From<Str> for Descriptor<N> {
    fn from(tag: Str) -> Self {
        Descriptor::Tag(tag)
    }
}

/// The stock fragment function.
///
/// Builds a document fragment holding the children.
pub fn fragment<N: ViewNode>() -> Descriptor<N> {
    Descriptor::function(|_| Rendered::Fragment)
}

/// A built node or view unit.
pub enum Built<N: ViewNode> {
    Node(N),
    Unit(Rc<dyn ViewUnit<N>>),
}

impl<N: ViewNode> Built<N> {
    /// The root node.
    pub fn node(&self) -> N {
        match self {
            Built::Node(node) => node.clone(),
            Built::Unit(unit) => unit.node(),
        }
    }

    pub fn unit(&self) -> Option<&Rc<dyn ViewUnit<N>>> {
        match self {
            Built::Node(_) => None,
            Built::Unit(unit) => Some(unit),
        }
    }
}

impl<N: ViewNode> From<Built<N>> for Child<N> {
    fn from(built: Built<N>) -> Self {
        match built {
            Built::Node(node) => Child::Node(node),
            Built::Unit(unit) => Child::Unit(unit),
        }
    }
}

/// Build a node.
///
/// * A tag creates an element, appends the children and then applies the
///   attributes, so attribute handlers see the finished subtree.
/// * A unit constructor is called with the attributes and children.
/// * A function is called with the attributes. If it returns
///   [`Rendered::Fragment`] the children are appended to a new fragment, otherwise
///   the children are dropped.
///
/// Returns `Ok(None)` if the tag name is rejected by the backend (the failure is
/// logged) or if a function rendered [`Rendered::Nothing`]. Errors from attribute
/// handlers and unit constructors are returned.
pub fn build<N: ViewNode>(
    descriptor: impl Into<Descriptor<N>>,
    attrs: Attrs<N>,
    children: Vec<Child<N>>,
) -> anyhow::Result<Option<Built<N>>> {
    match descriptor.into() {
        Descriptor::Tag(tag) => {
            let element = match N::element(&tag) {
                Ok(element) => element,
                Err(err) => {
                    log::error!("unable to create element '{tag}': {err}");
                    return Ok(None);
                }
            };
            append_children(&element, children);
            apply_attributes(&element, &attrs).with_context(|| format!("building <{tag}>"))?;
            Ok(Some(Built::Node(element)))
        }
        Descriptor::Unit(ctor) => Ok(Some(Built::Unit(ctor(attrs, children)?))),
        Descriptor::Function(f) => match f(&attrs) {
            Rendered::Node(node) => Ok(Some(Built::Node(node))),
            Rendered::Unit(unit) => Ok(Some(Built::Unit(unit))),
            Rendered::Fragment => {
                let fragment = N::fragment();
                append_children(&fragment, children);
                Ok(Some(Built::Node(fragment)))
            }
            Rendered::Nothing => Ok(None),
        },
    }
}

/// Apply attributes to a node, in order.
///
/// An `on*` attribute holding a handler becomes the node's event handler property.
/// Otherwise a handler registered for the name gets the attribute, and failing that
/// the value is bound as a plain attribute.
pub fn apply_attributes<N: ViewNode>(node: &N, attrs: &Attrs<N>) -> anyhow::Result<()> {
    for (name, value) in attrs.iter() {
        if name.len() > 2 && name.starts_with("on") {
            if let AttrValue::Handler(handler) = value {
                node.set_event_handler(name, handler.clone());
                continue;
            }
        }

        if let Some(handler) = attribute_handler::<N>(name) {
            handler(node, value, attrs).with_context(|| format!("applying attribute '{name}'"))?;
            continue;
        }

        match value {
            AttrValue::Bind(bind) => bind_attribute(node, name.to_owned(), bind.clone()),
            AttrValue::Handler(_) => {
                anyhow::bail!("'{name}' is not an event handler property")
            }
            AttrValue::Style(_) => {
                anyhow::bail!("'{name}' cannot hold style declarations")
            }
        }
    }
    Ok(())
}

/// Append children to a node, recursively flattening [`Child::Many`].
pub fn append_children<N: ViewNode>(parent: &N, children: impl IntoIterator<Item = Child<N>>) {
    for child in children {
        match child {
            Child::Node(node) => parent.append_child(&node),
            Child::Unit(unit) => parent.append_child(&unit.node()),
            Child::Value(value) => parent.append_child(&N::text(&value.to_text())),
            Child::Observable(source) => bind_child(parent, source, None),
            Child::Derived(f) => {
                let computed = Computed::new(move || f());
                let disposer = computed.disposer();
                bind_child(parent, Rc::new(computed), Some(disposer));
            }
            Child::List(array) => {
                let disposer = reconcile_list(parent, array);
                register_disposal(parent, disposer);
            }
            Child::Many(children) => append_children(parent, children),
        }
    }
}

fn render_content<N: ViewNode>(content: &Content<N>) -> N {
    match content {
        Content::Node(node) => node.clone(),
        Content::Value(value) => N::text(&value.to_text()),
    }
}

/// Append a node that follows `source`.
///
/// The binding's disposer lives on whichever node is currently rendered. It is
/// `owned` when given, otherwise the subscription's.
fn bind_child<N: ViewNode>(parent: &N, source: Rc<dyn Source<Content<N>>>, owned: Option<Disposer>) {
    let initial = render_content(&source.current());
    parent.append_child(&initial);
    log::trace!("binding child {:?} of {:?}", initial.key(), parent.key());

    let rendered = Rc::new(RefCell::new(initial.clone()));
    let slot: Rc<RefCell<Option<Disposer>>> = Default::default();
    let subscription = source.subscribe_boxed(Box::new({
        let rendered = rendered.clone();
        let slot = slot.clone();
        move |new, _| {
            let current = rendered.borrow().clone();
            let next = match new {
                Content::Node(node) => node.clone(),
                Content::Value(value) if current.kind() == NodeKind::Text => {
                    current.set_text_content(&value.to_text());
                    return;
                }
                Content::Value(value) => N::text(&value.to_text()),
            };
            if next == current {
                return;
            }
            match current.parent() {
                Some(parent) => parent.replace_child(&next, &current),
                None => log::warn!("reactive child {:?} is detached, not replacing it", current.key()),
            }
            if let Some(disposer) = slot.borrow().as_ref() {
                unregister_disposal(&current, disposer);
                register_disposal(&next, disposer.clone());
            }
            *rendered.borrow_mut() = next;
        }
    }));

    let disposer = owned.unwrap_or_else(|| subscription.disposer());
    register_disposal(&initial, disposer.clone());
    *slot.borrow_mut() = Some(disposer);
}

thread_local! {
    static NEXT_ELEMENT_ID: Cell<usize> = const { Cell::new(0) };
}

/// A unique element id, for wiring up labels and ARIA attributes.
///
/// Ids are `_0`, `_1` and so on.
pub fn generate_element_id() -> String {
    NEXT_ELEMENT_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        format!("_{id}")
    })
}
