//! Mirroring an observable array of nodes into the DOM.
//!
//! The reconciler keeps a private list of the nodes it has placed, in the same order
//! as the array. Change records are applied to that list and to the DOM as they
//! arrive. Entering and leaving nodes are animated by a [`ListAnimator`], moved
//! nodes are not.
use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use futures::future::LocalBoxFuture;

use crate::{
    animate::{CancellationToken, Cancelled, ListAnimator},
    array::{Change, ObservableArray},
    dispose::{Disposer, dispose_subtree},
    spawn::spawn_local,
    sync::PerType,
    view::{NodeKey, ViewNode},
};

struct AnimatorSlot<N: ViewNode>(Option<Rc<dyn ListAnimator<N>>>);

thread_local! {
    static ANIMATORS: PerType = PerType::default();
}

/// Replace the animator used by lists of `N` created after this call.
pub fn set_list_animator<N: ViewNode>(animator: Rc<dyn ListAnimator<N>>) {
    ANIMATORS.with(|animators| {
        animators.visit(|| AnimatorSlot::<N>(None), |slot| slot.0 = Some(animator))
    });
}

/// The animator lists of `N` use, [`ViewNode::default_list_animator`] unless
/// replaced.
pub fn list_animator<N: ViewNode>() -> Rc<dyn ListAnimator<N>> {
    ANIMATORS.with(|animators| {
        animators.visit(
            || AnimatorSlot::<N>(None),
            |slot| slot.0.get_or_insert_with(N::default_list_animator).clone(),
        )
    })
}

struct ListState<N: ViewNode> {
    /// The last known parent of the list's nodes, starting as the container.
    last_parent: RefCell<N>,
    mirror: RefCell<Vec<N>>,
    transitions: RefCell<HashMap<NodeKey, CancellationToken>>,
    animator: Rc<dyn ListAnimator<N>>,
}

impl<N: ViewNode> ListState<N> {
    /// The node list items are currently children of.
    ///
    /// This is the parent of any placed node, which differs from the container when
    /// the list was built inside a fragment. It is remembered so the list keeps its
    /// place after being emptied.
    fn parent(&self) -> N {
        let may_parent = self.mirror.borrow().iter().find_map(ViewNode::parent);
        match may_parent {
            Some(parent) => {
                *self.last_parent.borrow_mut() = parent.clone();
                parent
            }
            None => self.last_parent.borrow().clone(),
        }
    }

    fn cancel_transition(&self, node: &N) {
        if let Some(token) = self.transitions.borrow_mut().remove(&node.key()) {
            token.cancel();
        }
    }

    fn begin_transition(&self, node: &N) -> CancellationToken {
        self.cancel_transition(node);
        let token = CancellationToken::new();
        self.transitions
            .borrow_mut()
            .insert(node.key(), token.clone());
        token
    }

    fn spawn_transition(
        self: &Rc<Self>,
        node: &N,
        token: CancellationToken,
        transition: LocalBoxFuture<'static, Result<(), Cancelled>>,
    ) {
        let key = node.key();
        let state: Weak<Self> = Rc::downgrade(self);
        spawn_local(async move {
            if transition.await.is_err() {
                log::trace!("transition of {key:?} was cancelled");
            }
            if let Some(state) = state.upgrade() {
                let mut transitions = state.transitions.borrow_mut();
                if transitions.get(&key).is_some_and(|t| t.ptr_eq(&token)) {
                    transitions.remove(&key);
                }
            }
        });
    }

    fn apply(self: &Rc<Self>, change: &Change<N>) {
        match change {
            Change::Insert {
                items,
                index,
                moved,
            } => {
                let parent = self.parent();
                let index = (*index).min(self.mirror.borrow().len());
                log::trace!("inserting {} list items at {index}", items.len());
                let mut reference = self.mirror.borrow().get(index).cloned();
                for node in items.iter().rev() {
                    if *moved {
                        self.cancel_transition(node);
                        parent.insert_before(node, reference.as_ref());
                    } else {
                        let token = self.begin_transition(node);
                        let transition = self.animator.insert_before(
                            &parent,
                            node,
                            reference.as_ref(),
                            token.clone(),
                        );
                        self.spawn_transition(node, token, transition);
                    }
                    reference = Some(node.clone());
                }
                self.mirror
                    .borrow_mut()
                    .splice(index..index, items.iter().cloned());
            }
            Change::Remove {
                count,
                index,
                moved,
            } => {
                // Before anything is detached.
                self.parent();
                let removed = {
                    let mut mirror = self.mirror.borrow_mut();
                    let start = (*index).min(mirror.len());
                    let end = start.saturating_add(*count).min(mirror.len());
                    mirror.drain(start..end).collect::<Vec<_>>()
                };
                log::trace!("removing {} list items at {index}", removed.len());
                for node in removed {
                    if *moved {
                        self.cancel_transition(&node);
                        node.detach();
                    } else {
                        let token = self.begin_transition(&node);
                        let transition = self.animator.remove(&node, token.clone());
                        self.spawn_transition(&node, token, transition);
                        dispose_subtree(&node);
                    }
                }
            }
        }
    }
}

/// Mirror `array` into `container` using the animator from [`list_animator`].
///
/// Returns the disposer that stops the mirroring. It disposes `array` itself when
/// the array [owns its source](ObservableArray::owns_source).
pub fn reconcile_list<N: ViewNode>(container: &N, array: ObservableArray<N>) -> Disposer {
    reconcile_list_with(container, array, list_animator::<N>())
}

/// Mirror `array` into `container` using `animator`.
pub fn reconcile_list_with<N: ViewNode>(
    container: &N,
    array: ObservableArray<N>,
    animator: Rc<dyn ListAnimator<N>>,
) -> Disposer {
    let initial = array.snapshot();
    for node in initial.iter() {
        container.append_child(node);
    }
    let state = Rc::new(ListState {
        last_parent: RefCell::new(container.clone()),
        mirror: RefCell::new(initial),
        transitions: Default::default(),
        animator,
    });

    let subscription = array.subscribe(move |change| state.apply(change));
    if array.owns_source() {
        array.disposer()
    } else {
        subscription.disposer()
    }
}
