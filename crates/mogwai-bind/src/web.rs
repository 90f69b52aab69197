//! Browser views through web-sys.
//!
//! `web_sys::Node` implements [`ViewNode`]. Node identities for the disposal and
//! context side tables come from a `WeakMap`, so nothing is ever written onto the
//! nodes themselves.
use std::{cell::Cell, rc::Rc};

use futures::{FutureExt, future::LocalBoxFuture};
use wasm_bindgen::{JsCast, JsValue, UnwrapThrowExt, prelude::Closure};

use crate::{
    animate::{FrameClock, ListAnimator, NextFrame, VerticalListEaseOut},
    builder::{Child, Content},
    view::{EventHandler, NodeKey, NodeKind, ViewNode, Viewport},
};

/// Install the console logger and the panic hook.
pub fn init_logging(level: log::Level) -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    console_log::init_with_level(level)?;
    Ok(())
}

thread_local! {
    static WINDOW: web_sys::Window = web_sys::window().expect_throw("no window");
    static DOCUMENT: web_sys::Document = WINDOW.with(|w| w.document().expect_throw("no document"));
    static NODE_KEYS: js_sys::WeakMap = js_sys::WeakMap::new();
    static NEXT_KEY: Cell<u64> = const { Cell::new(0) };
}

fn log_err<T>(action: &str, result: Result<T, JsValue>) {
    if let Err(err) = result {
        log::error!("could not {action}: {err:?}");
    }
}

fn style(node: &web_sys::Node) -> Option<web_sys::CssStyleDeclaration> {
    if let Some(el) = node.dyn_ref::<web_sys::HtmlElement>() {
        Some(el.style())
    } else {
        node.dyn_ref::<web_sys::SvgElement>().map(|el| el.style())
    }
}

impl ViewNode for web_sys::Node {
    type Event = web_sys::Event;

    fn element(tag: &str) -> anyhow::Result<Self> {
        let element = DOCUMENT
            .with(|d| d.create_element(tag))
            .map_err(|err| anyhow::anyhow!("could not create element '{tag}': {err:?}"))?;
        Ok(element.into())
    }

    fn text(text: &str) -> Self {
        web_sys::Text::new_with_data(text).unwrap_throw().into()
    }

    fn comment(text: &str) -> Self {
        web_sys::Comment::new_with_data(text).unwrap_throw().into()
    }

    fn fragment() -> Self {
        web_sys::DocumentFragment::new().unwrap_throw().into()
    }

    fn kind(&self) -> NodeKind {
        match self.node_type() {
            web_sys::Node::TEXT_NODE => NodeKind::Text,
            web_sys::Node::COMMENT_NODE => NodeKind::Comment,
            web_sys::Node::DOCUMENT_FRAGMENT_NODE => NodeKind::Fragment,
            _ => NodeKind::Element,
        }
    }

    fn key(&self) -> NodeKey {
        let object: &js_sys::Object = self.as_ref();
        NODE_KEYS.with(|keys| {
            if let Some(key) = keys.get(object).as_f64() {
                return NodeKey(key as u64);
            }
            let key = NEXT_KEY.with(|next| {
                let key = next.get();
                next.set(key + 1);
                key
            });
            keys.set(object, &JsValue::from_f64(key as f64));
            NodeKey(key)
        })
    }

    fn parent(&self) -> Option<Self> {
        self.parent_node()
    }

    fn child_nodes(&self) -> Vec<Self> {
        let list = web_sys::Node::child_nodes(self);
        (0..list.length()).filter_map(|i| list.get(i)).collect()
    }

    fn append_child(&self, child: &Self) {
        log_err("append child", web_sys::Node::append_child(self, child));
    }

    fn insert_before(&self, child: &Self, reference: Option<&Self>) {
        log_err("insert child", web_sys::Node::insert_before(self, child, reference));
    }

    fn replace_child(&self, new_child: &Self, old_child: &Self) {
        log_err("replace child", web_sys::Node::replace_child(self, new_child, old_child));
    }

    fn remove_child(&self, child: &Self) {
        log_err("remove child", web_sys::Node::remove_child(self, child));
    }

    fn text_content(&self) -> String {
        web_sys::Node::text_content(self).unwrap_or_default()
    }

    fn set_text_content(&self, text: &str) {
        web_sys::Node::set_text_content(self, Some(text));
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        self.dyn_ref::<web_sys::Element>()?.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) {
        if let Some(el) = self.dyn_ref::<web_sys::Element>() {
            log_err("set attribute", el.set_attribute(name, value));
        }
    }

    fn remove_attribute(&self, name: &str) {
        if let Some(el) = self.dyn_ref::<web_sys::Element>() {
            log_err("remove attribute", el.remove_attribute(name));
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.dyn_ref::<web_sys::Element>()
            .is_some_and(|el| el.class_list().contains(class))
    }

    fn add_class(&self, class: &str) {
        if let Some(el) = self.dyn_ref::<web_sys::Element>() {
            log_err("add class", el.class_list().add_1(class));
        }
    }

    fn remove_class(&self, class: &str) {
        if let Some(el) = self.dyn_ref::<web_sys::Element>() {
            log_err("remove class", el.class_list().remove_1(class));
        }
    }

    fn get_style(&self, property: &str) -> Option<String> {
        style(self)?
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn set_style(&self, property: &str, value: &str) {
        if let Some(style) = style(self) {
            log_err("set style", style.set_property(property, value));
        }
    }

    fn remove_style(&self, property: &str) {
        if let Some(style) = style(self) {
            log_err("remove style", style.remove_property(property));
        }
    }

    fn set_event_handler(&self, name: &str, handler: EventHandler<web_sys::Event>) {
        let closure = Closure::wrap(Box::new(move |event: web_sys::Event| handler(&event))
            as Box<dyn FnMut(web_sys::Event)>);
        // JS owns the closure from here on, it is collected along with the node.
        log_err(
            "set event handler",
            js_sys::Reflect::set(self, &JsValue::from_str(name), &closure.into_js_value()),
        );
    }

    fn client_height(&self) -> f64 {
        self.dyn_ref::<web_sys::Element>()
            .map(|el| el.client_height() as f64)
            .unwrap_or(0.0)
    }

    fn is_visible(&self) -> bool {
        self.dyn_ref::<web_sys::HtmlElement>()
            .is_some_and(|el| el.offset_width() > 0 || el.offset_height() > 0)
    }

    fn computed_opacity(&self) -> f64 {
        let Some(el) = self.dyn_ref::<web_sys::Element>() else {
            return 1.0;
        };
        WINDOW
            .with(|w| w.get_computed_style(el))
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value("opacity").ok())
            .and_then(|opacity| opacity.parse().ok())
            .unwrap_or(1.0)
    }

    fn offset_parent(&self) -> Option<Self> {
        self.dyn_ref::<web_sys::HtmlElement>()?
            .offset_parent()
            .map(Into::into)
    }

    fn default_list_animator() -> Rc<dyn ListAnimator<Self>> {
        Rc::new(VerticalListEaseOut::new(RafClock).with_viewport(Rc::new(WindowViewport)))
    }
}

/// Frames from `window.requestAnimationFrame`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RafClock;

impl FrameClock for RafClock {
    fn now(&self) -> f64 {
        WINDOW.with(|w| w.performance().map(|p| p.now()).unwrap_or(0.0))
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, f64> {
        let frame = NextFrame::default();
        let callback = Closure::once_into_js({
            let frame = frame.clone();
            move |ts: JsValue| frame.resolve(ts.as_f64().unwrap_or(0.0))
        });
        log_err(
            "request animation frame",
            WINDOW.with(|w| w.request_animation_frame(callback.unchecked_ref())),
        );
        frame.boxed_local()
    }
}

/// The window's scroll position over the document body.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowViewport;

impl Viewport for WindowViewport {
    fn scroll_height(&self) -> f64 {
        DOCUMENT.with(|d| d.body().map(|b| b.scroll_height() as f64).unwrap_or(0.0))
    }

    fn inner_height(&self) -> f64 {
        WINDOW.with(|w| {
            w.inner_height()
                .ok()
                .and_then(|h| h.as_f64())
                .unwrap_or(0.0)
        })
    }

    fn scroll_y(&self) -> f64 {
        WINDOW.with(|w| w.scroll_y().unwrap_or(0.0))
    }

    fn scroll_by(&self, dy: f64) {
        WINDOW.with(|w| w.scroll_by_with_x_and_y(0.0, dy));
    }
}

macro_rules! node_child_impl {
    ($($ty:ident),*) => {
        $(
            impl From<web_sys::$ty> for Child<web_sys::Node> {
                fn from(node: web_sys::$ty) -> Self {
                    Child::Node(node.into())
                }
            }

            impl From<&web_sys::$ty> for Child<web_sys::Node> {
                fn from(node: &web_sys::$ty) -> Self {
                    let node: &web_sys::Node = node.as_ref();
                    Child::Node(node.clone())
                }
            }
        )*
    };
}

node_child_impl!(Node, Element, HtmlElement, Text, Comment, DocumentFragment);

impl From<web_sys::Node> for Content<web_sys::Node> {
    fn from(node: web_sys::Node) -> Self {
        Content::Node(node)
    }
}

impl From<web_sys::HtmlElement> for Content<web_sys::Node> {
    fn from(el: web_sys::HtmlElement) -> Self {
        Content::Node(el.into())
    }
}
