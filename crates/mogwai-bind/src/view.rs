//! Domain agnostic view nodes.
//!
//! [`ViewNode`] is the slice of the DOM this crate needs. It is implemented by
//! `web_sys::Node` (feature `web`) and by [`SsrNode`](crate::ssr::SsrNode)
//! (feature `ssr`).
use std::rc::Rc;

use crate::animate::ListAnimator;

/// A stable identity for a node, used to key side tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u64);

/// The kind of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Fragment,
}

/// A handler assigned to a node's event property, ie `onclick`.
pub type EventHandler<E> = Rc<dyn Fn(&E)>;

/// A domain-specific DOM node.
///
/// A node is a cheaply cloned handle; clones refer to the same underlying node
/// and compare equal.
///
/// DOM mutations are infallible here. Backends log failures instead of returning
/// them, the same way a script would keep running after a failed `insertBefore`.
pub trait ViewNode: Clone + PartialEq + 'static {
    /// The event type passed to event handlers.
    type Event: 'static;

    /// Create an element.
    ///
    /// Fails if the backend does not accept the tag name.
    fn element(tag: &str) -> anyhow::Result<Self>;
    fn text(text: &str) -> Self;
    fn comment(text: &str) -> Self;
    fn fragment() -> Self;

    fn kind(&self) -> NodeKind;
    fn key(&self) -> NodeKey;

    fn parent(&self) -> Option<Self>;
    fn child_nodes(&self) -> Vec<Self>;
    fn append_child(&self, child: &Self);
    /// Insert `child` before `reference`, or at the end if `reference` is `None`.
    fn insert_before(&self, child: &Self, reference: Option<&Self>);
    fn replace_child(&self, new_child: &Self, old_child: &Self);
    fn remove_child(&self, child: &Self);

    /// Remove this node from its parent, if it has one.
    fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    fn text_content(&self) -> String;
    fn set_text_content(&self, text: &str);

    fn get_attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&self, name: &str, value: &str);
    fn remove_attribute(&self, name: &str);

    fn has_class(&self, class: &str) -> bool;
    fn add_class(&self, class: &str);
    fn remove_class(&self, class: &str);

    /// Get an inline style property.
    fn get_style(&self, property: &str) -> Option<String>;
    fn set_style(&self, property: &str, value: &str);
    fn remove_style(&self, property: &str);

    /// Assign an event handler property, replacing any previous handler of that name.
    fn set_event_handler(&self, name: &str, handler: EventHandler<Self::Event>);

    /// The rendered inner height in pixels, `0.0` when there's no layout.
    fn client_height(&self) -> f64;
    /// Whether the node currently takes up space on screen.
    fn is_visible(&self) -> bool;
    /// The computed opacity, `1.0` unless something says otherwise.
    fn computed_opacity(&self) -> f64;
    /// The nearest positioned ancestor.
    fn offset_parent(&self) -> Option<Self>;

    /// The animator used by lists of this node type unless another was set with
    /// [`set_list_animator`](crate::reconcile::set_list_animator).
    fn default_list_animator() -> Rc<dyn ListAnimator<Self>>;
}

/// A stateful view unit that owns a root node.
///
/// View units are built by [`Descriptor::Unit`](crate::builder::Descriptor::Unit)
/// constructors and may be appended anywhere a node can.
pub trait ViewUnit<N: ViewNode> {
    fn node(&self) -> N;
}

impl<N: ViewNode, T: ViewUnit<N> + ?Sized> ViewUnit<N> for Rc<T> {
    fn node(&self) -> N {
        self.as_ref().node()
    }
}

/// The scrollable region a list lives in.
///
/// Used to keep the reader's place while items above the fold grow.
pub trait Viewport {
    /// Total scrollable height of the content.
    fn scroll_height(&self) -> f64;
    /// Height of the visible area.
    fn inner_height(&self) -> f64;
    /// Current vertical scroll offset.
    fn scroll_y(&self) -> f64;
    fn scroll_by(&self, dy: f64);

    /// Distance between the bottom of the visible area and the end of the content.
    fn scroll_bottom(&self) -> f64 {
        self.scroll_height() - self.inner_height() - self.scroll_y()
    }
}
