//! Per-node ownership of cleanup callbacks.
//!
//! Every live binding registers a [`Disposer`] against the node it mutates. Calling
//! [`dispose_subtree`] on a node tears down every binding beneath it, children first,
//! and then the node's own bindings in reverse registration order.
//!
//! The registry is a side table keyed by [`NodeKey`], so nodes themselves never carry
//! any extra state.
use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

use crate::view::{NodeKey, ViewNode};

type DisposeFn = Box<dyn FnOnce()>;

/// A cleanup callback that runs at most once.
///
/// Clones refer to the same callback, so disposing any clone disposes them all.
/// Identity (for [`unregister_disposal`]) is pointer identity.
#[derive(Clone)]
pub struct Disposer(Rc<RefCell<Option<DisposeFn>>>);

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Disposer {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Disposer(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// Run the callback, if it hasn't already run.
    pub fn dispose(&self) {
        let may_f = self.0.borrow_mut().take();
        if let Some(f) = may_f {
            f();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.borrow().is_none()
    }

    pub fn ptr_eq(&self, other: &Disposer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    static DISPOSALS: RefCell<HashMap<NodeKey, Vec<Disposer>>> = Default::default();
    static CONTEXTS: RefCell<HashMap<NodeKey, Rc<dyn Any>>> = Default::default();
}

/// Append `disposer` to the node's disposal list.
pub fn register_disposal<N: ViewNode>(node: &N, disposer: Disposer) {
    let key = node.key();
    DISPOSALS.with(|disposals| {
        disposals.borrow_mut().entry(key).or_default().push(disposer);
    });
}

/// Remove the first registration of `disposer` from the node's disposal list.
///
/// The disposer itself is not run.
pub fn unregister_disposal<N: ViewNode>(node: &N, disposer: &Disposer) {
    let key = node.key();
    DISPOSALS.with(|disposals| {
        let mut disposals = disposals.borrow_mut();
        if let Some(list) = disposals.get_mut(&key) {
            if let Some(index) = list.iter().position(|d| d.ptr_eq(disposer)) {
                list.remove(index);
            }
            if list.is_empty() {
                disposals.remove(&key);
            }
        }
    });
}

/// Returns whether the node has any pending disposals of its own.
pub fn has_disposals<N: ViewNode>(node: &N) -> bool {
    let key = node.key();
    DISPOSALS.with(|disposals| disposals.borrow().contains_key(&key))
}

/// Dispose the node's children (recursively), then the node itself.
///
/// The node's own disposers run in reverse registration order. Disposing a node
/// twice is a no-op the second time.
pub fn dispose_subtree<N: ViewNode>(node: &N) {
    for child in node.child_nodes() {
        dispose_subtree(&child);
    }

    let key = node.key();
    // Take the list before running anything, disposers may register or unregister.
    let may_list = DISPOSALS.with(|disposals| disposals.borrow_mut().remove(&key));
    if let Some(list) = may_list {
        log::trace!("disposing {} callbacks of node {:?}", list.len(), key);
        for disposer in list.into_iter().rev() {
            disposer.dispose();
        }
    }
    CONTEXTS.with(|contexts| contexts.borrow_mut().remove(&key));
}

/// Attach a binding context to a node.
pub fn set_context<N: ViewNode, T: Any>(node: &N, context: Rc<T>) {
    let key = node.key();
    CONTEXTS.with(|contexts| {
        contexts.borrow_mut().insert(key, context as Rc<dyn Any>);
    });
}

/// Find the nearest context of type `T`, looking at the node and then its ancestors.
pub fn context<N: ViewNode, T: Any>(node: &N) -> Option<Rc<T>> {
    let mut may_node = Some(node.clone());
    while let Some(node) = may_node {
        let key = node.key();
        let found = CONTEXTS.with(|contexts| contexts.borrow().get(&key).cloned());
        if let Some(context) = found.and_then(|c| c.downcast::<T>().ok()) {
            return Some(context);
        }
        may_node = node.parent();
    }
    None
}
