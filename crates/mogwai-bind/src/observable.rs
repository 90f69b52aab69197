//! Observable values.
//!
//! [`Observable`] is a shared cell that notifies its listeners synchronously every
//! time its value changes. [`Computed`] derives a value from a closure, tracking
//! every observable the closure reads and recomputing when any of them change.
//!
//! Subscriptions are explicit. Dropping a [`Subscription`] does nothing, it must be
//! disposed, usually by registering its [`Disposer`] against a node.
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::dispose::Disposer;

type Listener<T> = Rc<RefCell<dyn FnMut(&T, &T)>>;

struct Entry<T> {
    id: u64,
    active: Rc<Cell<bool>>,
    listener: Listener<T>,
}

struct Inner<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<Entry<T>>>,
    next_id: Cell<u64>,
}

/// A handle to a live subscription.
///
/// Clones refer to the same subscription.
#[derive(Clone, Debug)]
pub struct Subscription {
    disposer: Disposer,
}

impl Subscription {
    pub(crate) fn from_disposer(disposer: Disposer) -> Self {
        Subscription { disposer }
    }

    /// Stop receiving updates.
    pub fn dispose(&self) {
        self.disposer.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposer.is_disposed()
    }

    /// The disposer that ends this subscription, for registering against a node.
    pub fn disposer(&self) -> Disposer {
        self.disposer.clone()
    }
}

/// A shared value with synchronous change notification.
///
/// Listeners are called with `(new, old)` each time [`Observable::set`] stores a
/// value that differs from the current one.
pub struct Observable<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            inner: self.inner.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observable")
            .field(&*self.inner.value.borrow())
            .finish()
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Observable::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Observable {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                listeners: Default::default(),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Returns a clone of the current value.
    ///
    /// When called while a [`Computed`] is evaluating, the computed will depend on
    /// this observable.
    pub fn get(&self) -> T {
        track_read(self);
        self.get_untracked()
    }

    /// Returns a clone of the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Store a new value, notifying listeners if it differs from the old one.
    pub fn set(&self, value: T) {
        let old = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.notify(&value, &old);
    }

    /// Mutate the value in place, notifying listeners if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get_untracked();
        f(&mut value);
        self.set(value);
    }

    /// Subscribe to changes.
    pub fn subscribe(&self, f: impl FnMut(&T, &T) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let active = Rc::new(Cell::new(true));
        let listener: Listener<T> = Rc::new(RefCell::new(f));
        self.inner.listeners.borrow_mut().push(Entry {
            id,
            active: active.clone(),
            listener,
        });

        let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        Subscription {
            disposer: Disposer::new(move || {
                active.set(false);
                if let Some(inner) = weak.upgrade() {
                    inner.listeners.borrow_mut().retain(|entry| entry.id != id);
                }
            }),
        }
    }

    /// Subscribe to changes and immediately invoke `f` with the current value
    /// as both the new and the old value.
    pub fn subscribe_invoke(&self, mut f: impl FnMut(&T, &T) + 'static) -> Subscription {
        let current = self.get_untracked();
        f(&current, &current);
        self.subscribe(f)
    }

    /// The number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn notify(&self, new: &T, old: &T) {
        // Listeners may subscribe or dispose while we iterate, so work on a snapshot.
        let snapshot = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|entry| (entry.active.clone(), entry.listener.clone()))
            .collect::<Vec<_>>();
        for (active, listener) in snapshot {
            if !active.get() {
                continue;
            }
            match listener.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(new, old),
                Err(_) => log::warn!(
                    "skipping re-entrant listener of Observable<{}>",
                    std::any::type_name::<T>()
                ),
            }
        }
    }

    fn clear_listeners(&self) {
        let entries = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        for entry in entries {
            entry.active.set(false);
        }
    }
}

/// Something that can be depended upon by a [`Computed`].
trait Dependency {
    fn id(&self) -> usize;
    fn on_change(&self, f: Rc<dyn Fn()>) -> Subscription;
}

impl<T: Clone + PartialEq + 'static> Dependency for Observable<T> {
    fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    fn on_change(&self, f: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(move |_, _| f())
    }
}

thread_local! {
    static TRACKING: RefCell<Vec<Vec<Rc<dyn Dependency>>>> = Default::default();
}

fn track_read<T: Clone + PartialEq + 'static>(observable: &Observable<T>) {
    TRACKING.with(|tracking| {
        if let Some(frame) = tracking.borrow_mut().last_mut() {
            frame.push(Rc::new(observable.clone()));
        }
    });
}

/// Run `f`, returning its result and every observable it read.
fn track<X>(f: impl FnOnce() -> X) -> (X, Vec<Rc<dyn Dependency>>) {
    TRACKING.with(|tracking| tracking.borrow_mut().push(vec![]));
    let x = f();
    let mut dependencies = TRACKING
        .with(|tracking| tracking.borrow_mut().pop())
        .unwrap_or_default();
    let mut seen = std::collections::HashSet::new();
    dependencies.retain(|dep| seen.insert(dep.id()));
    (x, dependencies)
}

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    observable: Observable<T>,
    dependencies: RefCell<Vec<Subscription>>,
    disposed: Cell<bool>,
}

impl<T: Clone + PartialEq + 'static> ComputedInner<T> {
    fn watch(self: &Rc<Self>, dependencies: Vec<Rc<dyn Dependency>>) {
        let weak = Rc::downgrade(self);
        let subscriptions = dependencies
            .iter()
            .map(|dependency| {
                let weak = weak.clone();
                dependency.on_change(Rc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.recompute();
                    }
                }))
            })
            .collect::<Vec<_>>();
        let previous = std::mem::replace(&mut *self.dependencies.borrow_mut(), subscriptions);
        for subscription in previous {
            subscription.dispose();
        }
    }

    fn recompute(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        let (value, dependencies) = track(|| (self.compute)());
        self.watch(dependencies);
        self.observable.set(value);
    }
}

/// A value derived from other observables.
///
/// The closure runs once on creation and again whenever an observable it read
/// during its last run changes. The set of dependencies is recalculated on every
/// run.
///
/// A computed holds subscriptions on its dependencies until
/// [`Computed::dispose`] is called. Whoever creates a computed is responsible for
/// disposing it.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        let (value, dependencies) = track(&f);
        let inner = Rc::new(ComputedInner {
            compute: Box::new(f),
            observable: Observable::new(value),
            dependencies: Default::default(),
            disposed: Cell::new(false),
        });
        inner.watch(dependencies);
        Computed { inner }
    }

    /// Returns a clone of the current value, registering a dependency if called from
    /// within another computation.
    pub fn get(&self) -> T {
        self.inner.observable.get()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.observable.get_untracked()
    }

    pub fn subscribe(&self, f: impl FnMut(&T, &T) + 'static) -> Subscription {
        self.inner.observable.subscribe(f)
    }

    pub fn subscribe_invoke(&self, f: impl FnMut(&T, &T) + 'static) -> Subscription {
        self.inner.observable.subscribe_invoke(f)
    }

    /// Release every dependency subscription and drop all listeners.
    ///
    /// The value is frozen afterwards.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let dependencies = std::mem::take(&mut *self.inner.dependencies.borrow_mut());
        for subscription in dependencies {
            subscription.dispose();
        }
        self.inner.observable.clear_listeners();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// A disposer that disposes this computed.
    pub fn disposer(&self) -> Disposer {
        let computed = self.clone();
        Disposer::new(move || computed.dispose())
    }

    /// The number of observables this computed currently depends on.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }
}

/// An object safe view of an observable, with values converted to `X`.
///
/// Bindings store their sources as `Rc<dyn Source<X>>` so that an
/// `Observable<&'static str>` and a `Computed<u32>` can both feed the same
/// attribute binding.
pub trait Source<X> {
    fn current(&self) -> X;
    fn subscribe_boxed(&self, f: Box<dyn FnMut(&X, &X)>) -> Subscription;

    fn subscribe_invoke_boxed(&self, mut f: Box<dyn FnMut(&X, &X)>) -> Subscription {
        let current = self.current();
        f(&current, &current);
        self.subscribe_boxed(f)
    }
}

impl<T, X> Source<X> for Observable<T>
where
    T: Clone + PartialEq + Into<X> + 'static,
    X: 'static,
{
    fn current(&self) -> X {
        self.get_untracked().into()
    }

    fn subscribe_boxed(&self, mut f: Box<dyn FnMut(&X, &X)>) -> Subscription {
        self.subscribe(move |new, old| {
            let new: X = new.clone().into();
            let old: X = old.clone().into();
            f(&new, &old)
        })
    }
}

impl<T, X> Source<X> for Computed<T>
where
    T: Clone + PartialEq + Into<X> + 'static,
    X: 'static,
{
    fn current(&self) -> X {
        self.inner.observable.current()
    }

    fn subscribe_boxed(&self, f: Box<dyn FnMut(&X, &X)>) -> Subscription {
        self.inner.observable.subscribe_boxed(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<(T, T)>>>, impl FnMut(&T, &T) + 'static) {
        let log = Rc::new(RefCell::new(vec![]));
        let f = {
            let log = log.clone();
            move |new: &T, old: &T| log.borrow_mut().push((new.clone(), old.clone()))
        };
        (log, f)
    }

    #[test]
    fn notifies_on_change_only() {
        let o = Observable::new(1);
        let (log, f) = recorder::<i32>();
        let _sub = o.subscribe(f);
        o.set(1);
        o.set(2);
        o.update(|n| *n += 1);
        assert_eq!(*log.borrow(), vec![(2, 1), (3, 2)]);
    }

    #[test]
    fn subscribe_invoke_sees_current_value() {
        let o = Observable::new("a");
        let (log, f) = recorder::<&str>();
        let _sub = o.subscribe_invoke(f);
        o.set("b");
        assert_eq!(*log.borrow(), vec![("a", "a"), ("b", "a")]);
    }

    #[test]
    fn dispose_stops_delivery() {
        let o = Observable::new(0);
        let (log, f) = recorder::<i32>();
        let sub = o.subscribe(f);
        let other = o.subscribe(|_, _| {});
        assert_eq!(o.listener_count(), 2);
        sub.dispose();
        sub.dispose();
        assert_eq!(o.listener_count(), 1);
        o.set(5);
        assert!(log.borrow().is_empty());
        other.dispose();
        assert_eq!(o.listener_count(), 0);
    }

    #[test]
    fn listener_may_dispose_a_later_listener() {
        let o = Observable::new(0);
        let later: Rc<RefCell<Option<Subscription>>> = Default::default();
        let _first = o.subscribe({
            let later = later.clone();
            move |_, _| {
                if let Some(sub) = later.borrow().as_ref() {
                    sub.dispose();
                }
            }
        });
        let (log, f) = recorder::<i32>();
        *later.borrow_mut() = Some(o.subscribe(f));
        o.set(1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn computed_tracks_dependencies() {
        let a = Observable::new(1);
        let b = Observable::new(10);
        let sum = Computed::new({
            let (a, b) = (a.clone(), b.clone());
            move || a.get() + b.get()
        });
        assert_eq!(sum.get_untracked(), 11);
        assert_eq!(sum.dependency_count(), 2);

        let (log, f) = recorder::<i32>();
        let _sub = sum.subscribe(f);
        a.set(2);
        b.set(20);
        assert_eq!(*log.borrow(), vec![(12, 11), (22, 12)]);
    }

    #[test]
    fn computed_dependencies_are_dynamic() {
        let flag = Observable::new(true);
        let left = Observable::new("left");
        let right = Observable::new("right");
        let pick = Computed::new({
            let (flag, left, right) = (flag.clone(), left.clone(), right.clone());
            move || if flag.get() { left.get() } else { right.get() }
        });
        assert_eq!(left.listener_count(), 1);
        assert_eq!(right.listener_count(), 0);

        flag.set(false);
        assert_eq!(pick.get_untracked(), "right");
        assert_eq!(left.listener_count(), 0);
        assert_eq!(right.listener_count(), 1);
    }

    #[test]
    fn computed_dispose_releases_dependencies() {
        let a = Observable::new(1);
        let doubled = Computed::new({
            let a = a.clone();
            move || a.get() * 2
        });
        let (log, f) = recorder::<i32>();
        let _sub = doubled.subscribe(f);
        assert_eq!(a.listener_count(), 1);

        doubled.disposer().dispose();
        assert!(doubled.is_disposed());
        assert_eq!(a.listener_count(), 0);
        a.set(2);
        assert_eq!(doubled.get_untracked(), 2);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn computed_of_computed() {
        let a = Observable::new(2);
        let squared = Computed::new({
            let a = a.clone();
            move || a.get() * a.get()
        });
        let label = Computed::new({
            let squared = squared.clone();
            move || format!("{} squared", squared.get())
        });
        a.set(3);
        assert_eq!(label.get_untracked(), "9 squared");
    }

    #[test]
    fn source_converts_values() {
        let o = Observable::new(7u8);
        let source: Rc<dyn Source<crate::value::Value>> = Rc::new(o.clone());
        assert_eq!(source.current().to_text(), "7");
        let texts = Rc::new(RefCell::new(vec![]));
        let _sub = source.subscribe_invoke_boxed(Box::new({
            let texts = texts.clone();
            move |new, old| {
                texts
                    .borrow_mut()
                    .push(format!("{} <- {}", new.to_text(), old.to_text()))
            }
        }));
        o.set(8);
        assert_eq!(*texts.borrow(), vec!["7 <- 7", "8 <- 7"]);
    }
}
