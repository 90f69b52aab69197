//! Observable arrays.
//!
//! An [`ObservableArray`] is an ordered sequence that publishes a [`Change`] record
//! for every mutation. Derived arrays made with [`ObservableArray::map`] and
//! [`ObservableArray::filter`] follow their source and own their subscription to it.
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::{dispose::Disposer, observable::Subscription};

/// A single mutation of an [`ObservableArray`].
///
/// `moved` marks records that are one half of a relocation. A relocation is always
/// delivered as a `Remove` followed by an `Insert` of the same items.
#[derive(Clone, Debug, PartialEq)]
pub enum Change<T> {
    Insert { items: Vec<T>, index: usize, moved: bool },
    Remove { count: usize, index: usize, moved: bool },
}

type ChangeListener<T> = Rc<RefCell<dyn FnMut(&Change<T>)>>;

struct ListenerEntry<T> {
    id: u64,
    active: Rc<Cell<bool>>,
    listener: ChangeListener<T>,
}

struct ArrayInner<T> {
    items: RefCell<Vec<T>>,
    listeners: RefCell<Vec<ListenerEntry<T>>>,
    next_id: Cell<u64>,
    upstream: RefCell<Option<Subscription>>,
    owns_source: bool,
}

/// An ordered collection with change notification.
pub struct ObservableArray<T> {
    inner: Rc<ArrayInner<T>>,
}

impl<T> Clone for ObservableArray<T> {
    fn clone(&self) -> Self {
        ObservableArray {
            inner: self.inner.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableArray")
            .field(&*self.inner.items.borrow())
            .finish()
    }
}

impl<T: Clone + 'static> FromIterator<T> for ObservableArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ObservableArray::new(iter.into_iter().collect())
    }
}

impl<T: Clone + 'static> ObservableArray<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self::with_source(items, false)
    }

    fn with_source(items: Vec<T>, owns_source: bool) -> Self {
        ObservableArray {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(items),
                listeners: Default::default(),
                next_id: Cell::new(0),
                upstream: Default::default(),
                owns_source,
            }),
        }
    }

    /// A copy of the current items.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, item: T) {
        let index = self.len();
        self.splice_in(index, vec![item], false);
    }

    /// Insert `items` at `index`, which is clamped to the length.
    pub fn insert(&self, index: usize, items: Vec<T>) {
        self.splice_in(index, items, false);
    }

    /// Remove `count` items starting at `index`, returning them.
    pub fn remove(&self, index: usize, count: usize) -> Vec<T> {
        self.splice_out(index, count, false)
    }

    pub fn clear(&self) {
        let count = self.len();
        self.splice_out(0, count, false);
    }

    /// Relocate the item at `from` so that it ends up at `to`.
    ///
    /// Listeners see a moved `Remove` followed by a moved `Insert`.
    pub fn move_item(&self, from: usize, to: usize) {
        let items = self.splice_out(from, 1, true);
        if !items.is_empty() {
            self.splice_in(to, items, true);
        }
    }

    /// Subscribe to change records.
    pub fn subscribe(&self, f: impl FnMut(&Change<T>) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let active = Rc::new(Cell::new(true));
        let listener: ChangeListener<T> = Rc::new(RefCell::new(f));
        self.inner.listeners.borrow_mut().push(ListenerEntry {
            id,
            active: active.clone(),
            listener,
        });

        let weak: Weak<ArrayInner<T>> = Rc::downgrade(&self.inner);
        Subscription::from_disposer(Disposer::new(move || {
            active.set(false);
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|entry| entry.id != id);
            }
        }))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Whether disposing this array releases a subscription to another array.
    ///
    /// True for arrays made by [`ObservableArray::map`] and [`ObservableArray::filter`].
    pub fn owns_source(&self) -> bool {
        self.inner.owns_source
    }

    /// Stop following the source array, if any, and drop every listener.
    pub fn dispose(&self) {
        let may_upstream = self.inner.upstream.borrow_mut().take();
        if let Some(upstream) = may_upstream {
            upstream.dispose();
        }
        let entries = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        for entry in entries {
            entry.active.set(false);
        }
    }

    /// A disposer that disposes this array.
    pub fn disposer(&self) -> Disposer {
        let array = self.clone();
        Disposer::new(move || array.dispose())
    }

    /// A derived array of `f` applied to each item.
    ///
    /// `f` runs once per inserted item. Items relocated in the source keep their
    /// mapped values.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> ObservableArray<U> {
        let mapped = ObservableArray::with_source(
            self.inner.items.borrow().iter().map(&f).collect(),
            true,
        );
        let weak = Rc::downgrade(&mapped.inner);
        let mut stash: Vec<U> = vec![];
        let subscription = self.subscribe(move |change| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mapped = ObservableArray { inner };
            match change {
                Change::Insert {
                    items,
                    index,
                    moved,
                } => {
                    let values = if *moved && stash.len() == items.len() {
                        std::mem::take(&mut stash)
                    } else {
                        items.iter().map(&f).collect()
                    };
                    mapped.splice_in(*index, values, *moved);
                }
                Change::Remove {
                    count,
                    index,
                    moved,
                } => {
                    let removed = mapped.splice_out(*index, *count, *moved);
                    if *moved {
                        stash = removed;
                    }
                }
            }
        });
        *mapped.inner.upstream.borrow_mut() = Some(subscription);
        mapped
    }

    /// A derived array of the items for which `predicate` holds.
    ///
    /// The predicate is evaluated once, when an item enters the source.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> ObservableArray<T> {
        let mut included = self
            .inner
            .items
            .borrow()
            .iter()
            .map(&predicate)
            .collect::<Vec<_>>();
        let filtered = ObservableArray::with_source(
            self.inner
                .items
                .borrow()
                .iter()
                .zip(included.iter())
                .filter_map(|(item, keep)| keep.then(|| item.clone()))
                .collect(),
            true,
        );
        let weak = Rc::downgrade(&filtered.inner);
        let subscription = self.subscribe(move |change| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let filtered = ObservableArray { inner };
            match change {
                Change::Insert {
                    items,
                    index,
                    moved,
                } => {
                    let index = (*index).min(included.len());
                    let target = included[..index].iter().filter(|keep| **keep).count();
                    let flags = items.iter().map(&predicate).collect::<Vec<_>>();
                    let kept = items
                        .iter()
                        .zip(flags.iter())
                        .filter_map(|(item, keep)| keep.then(|| item.clone()))
                        .collect::<Vec<_>>();
                    included.splice(index..index, flags);
                    if !kept.is_empty() {
                        filtered.splice_in(target, kept, *moved);
                    }
                }
                Change::Remove {
                    count,
                    index,
                    moved,
                } => {
                    let start = (*index).min(included.len());
                    let end = start.saturating_add(*count).min(included.len());
                    let target = included[..start].iter().filter(|keep| **keep).count();
                    let removed = included
                        .drain(start..end)
                        .filter(|keep| *keep)
                        .count();
                    if removed > 0 {
                        filtered.splice_out(target, removed, *moved);
                    }
                }
            }
        });
        *filtered.inner.upstream.borrow_mut() = Some(subscription);
        filtered
    }

    fn splice_in(&self, index: usize, items: Vec<T>, moved: bool) {
        if items.is_empty() {
            return;
        }
        let index = {
            let mut current = self.inner.items.borrow_mut();
            let index = index.min(current.len());
            current.splice(index..index, items.iter().cloned());
            index
        };
        self.notify(&Change::Insert {
            items,
            index,
            moved,
        });
    }

    fn splice_out(&self, index: usize, count: usize, moved: bool) -> Vec<T> {
        let (removed, index) = {
            let mut current = self.inner.items.borrow_mut();
            let start = index.min(current.len());
            let end = start.saturating_add(count).min(current.len());
            (current.drain(start..end).collect::<Vec<_>>(), start)
        };
        if !removed.is_empty() {
            self.notify(&Change::Remove {
                count: removed.len(),
                index,
                moved,
            });
        }
        removed
    }

    fn notify(&self, change: &Change<T>) {
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
                Ok(mut f) => (&mut *f)(change),
                Err(_) => log::warn!(
                    "skipping re-entrant listener of ObservableArray<{}>",
                    std::any::type_name::<T>()
                ),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record<T: Clone + 'static>(array: &ObservableArray<T>) -> Rc<RefCell<Vec<Change<T>>>> {
        let log = Rc::new(RefCell::new(vec![]));
        let _sub = array.subscribe({
            let log = log.clone();
            move |change| log.borrow_mut().push(change.clone())
        });
        log
    }

    #[test]
    fn mutations_emit_changes() {
        let array = ObservableArray::new(vec!['a', 'b']);
        let log = record(&array);
        array.push('c');
        array.insert(1, vec!['x', 'y']);
        let removed = array.remove(0, 2);
        assert_eq!(removed, vec!['a', 'x']);
        assert_eq!(array.snapshot(), vec!['y', 'b', 'c']);
        assert_eq!(
            *log.borrow(),
            vec![
                Change::Insert {
                    items: vec!['c'],
                    index: 2,
                    moved: false
                },
                Change::Insert {
                    items: vec!['x', 'y'],
                    index: 1,
                    moved: false
                },
                Change::Remove {
                    count: 2,
                    index: 0,
                    moved: false
                },
            ]
        );
    }

    #[test]
    fn out_of_range_is_clamped() {
        let array: ObservableArray<u8> = [1, 2].into_iter().collect();
        let log = record(&array);
        array.insert(10, vec![3]);
        assert_eq!(array.remove(5, 1), Vec::<u8>::new());
        assert_eq!(array.remove(1, 10), vec![2, 3]);
        assert_eq!(log.borrow().len(), 2);
        array.clear();
        assert!(array.is_empty());
    }

    #[test]
    fn huge_remove_counts_are_clamped() {
        let array = ObservableArray::new(vec![1, 2, 3, 4]);
        let evens = array.filter(|n| n % 2 == 0);
        let log = record(&array);
        assert_eq!(array.remove(1, usize::MAX), vec![2, 3, 4]);
        assert_eq!(array.snapshot(), vec![1]);
        assert!(evens.is_empty());
        assert!(matches!(
            log.borrow().as_slice(),
            [Change::Remove { count: 3, index: 1, moved: false }]
        ));
        assert_eq!(array.remove(usize::MAX, usize::MAX), Vec::<i32>::new());
    }

    #[test]
    fn move_is_a_moved_remove_then_insert() {
        let array = ObservableArray::new(vec![1, 2, 3]);
        let log = record(&array);
        array.move_item(0, 2);
        assert_eq!(array.snapshot(), vec![2, 3, 1]);
        assert_eq!(
            *log.borrow(),
            vec![
                Change::Remove {
                    count: 1,
                    index: 0,
                    moved: true
                },
                Change::Insert {
                    items: vec![1],
                    index: 2,
                    moved: true
                },
            ]
        );
    }

    #[test]
    fn map_follows_source_and_reuses_moved_values() {
        let calls = Rc::new(Cell::new(0));
        let source = ObservableArray::new(vec![1, 2, 3]);
        let mapped = source.map({
            let calls = calls.clone();
            move |n| {
                calls.set(calls.get() + 1);
                n * 10
            }
        });
        assert!(mapped.owns_source());
        assert!(!source.owns_source());
        assert_eq!(mapped.snapshot(), vec![10, 20, 30]);
        assert_eq!(calls.get(), 3);

        source.push(4);
        source.remove(0, 1);
        assert_eq!(mapped.snapshot(), vec![20, 30, 40]);
        assert_eq!(calls.get(), 4);

        source.move_item(2, 0);
        assert_eq!(mapped.snapshot(), vec![40, 20, 30]);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn filter_tracks_included_positions() {
        let source = ObservableArray::new(vec![1, 2, 3, 4]);
        let evens = source.filter(|n| n % 2 == 0);
        let log = record(&evens);
        assert_eq!(evens.snapshot(), vec![2, 4]);

        source.insert(1, vec![6, 7]);
        assert_eq!(evens.snapshot(), vec![6, 2, 4]);
        source.remove(2, 2);
        assert_eq!(source.snapshot(), vec![1, 6, 3, 4]);
        assert_eq!(evens.snapshot(), vec![6, 4]);
        source.remove(0, 1);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn disposing_derived_releases_source() {
        let source = ObservableArray::new(vec![1]);
        let mapped = source.map(|n| n + 1);
        assert_eq!(source.listener_count(), 1);
        mapped.disposer().dispose();
        assert_eq!(source.listener_count(), 0);
        source.push(2);
        assert_eq!(mapped.snapshot(), vec![2]);
    }
}
