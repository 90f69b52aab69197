//! # mogwai-bind
//!
//! Declarative DOM construction where nodes stay in sync with observable data.
//!
//! A tree is described with [`build`](builder::build): a tag name, a view unit or a
//! function, some attributes and an arbitrarily nested list of children. Any
//! attribute or child may be a static value, an [`Observable`](observable::Observable)
//! or a closure that derives its value from other observables. The resulting
//! bindings are owned by the nodes they mutate, and are released together with the
//! node by [`dispose_subtree`](dispose::dispose_subtree).
//!
//! Children may also be an [`ObservableArray`](array::ObservableArray) of nodes. The
//! list is patched in place as the array changes, and inserted or removed items are
//! animated by a [`ListAnimator`](animate::ListAnimator).
//!
//! ## Backends
//! Everything is generic over [`ViewNode`](view::ViewNode):
//! * `ssr` (default) - an in-memory DOM that renders to an HTML string. This is what
//!   the tests run against.
//! * `web` - `web_sys::Node` in the browser.
//!
//! ```rust
//! # #[cfg(feature = "ssr")]
//! # {
//! use mogwai_bind::{prelude::*, ssr::SsrNode};
//!
//! let count = Observable::new(0);
//! let div = build::<SsrNode>(
//!     "div",
//!     Attrs::new().with("class", "counter"),
//!     children!["clicks: ", count.clone()],
//! )
//! .unwrap()
//! .unwrap()
//! .node();
//! assert_eq!(div.html_string(), r#"<div class="counter">clicks: 0</div>"#);
//!
//! count.set(3);
//! assert_eq!(div.html_string(), r#"<div class="counter">clicks: 3</div>"#);
//!
//! dispose_subtree(&div);
//! count.set(4);
//! assert_eq!(div.html_string(), r#"<div class="counter">clicks: 3</div>"#);
//! # }
//! ```
pub mod animate;
pub mod array;
pub mod bind;
pub mod builder;
pub mod dispose;
pub mod handlers;
pub mod observable;
pub mod reconcile;
pub mod spawn;
#[cfg(feature = "ssr")]
pub mod ssr;
pub mod str;
pub mod sync;
pub mod value;
pub mod view;
#[cfg(feature = "web")]
pub mod web;

pub use anyhow::Error;

pub mod prelude {
    //! Re-exports for convenience.
    pub use super::animate::{CancellationToken, ListAnimator};
    pub use super::array::{Change, ObservableArray};
    pub use super::bind::{
        Bind, apply_style, bind_attribute, bind_class, bind_class_list, bind_style, bind_text,
        derive,
    };
    pub use super::builder::{
        AttrValue, Attrs, Built, Child, Content, Descriptor, Rendered, append_children,
        apply_attributes, build, fragment, generate_element_id,
    };
    pub use super::children;
    pub use super::dispose::{
        Disposer, context, dispose_subtree, register_disposal, set_context, unregister_disposal,
    };
    pub use super::handlers::{register_attribute_handler, unregister_attribute_handler};
    pub use super::observable::{Computed, Observable, Subscription};
    pub use super::str::Str;
    pub use super::value::Value;
    pub use super::view::{NodeKind, ViewNode, ViewUnit};
}
