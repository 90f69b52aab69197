//! Thread-local globals keyed by type.
//!
//! Statics can't be generic, but some registries (attribute handlers, list
//! animators) need one instance per node type. [`PerType`] stores one lazily created
//! value per `T` for the current thread.
use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
};

/// A map from a type to one lazily created value of that type.
#[derive(Default)]
pub struct PerType {
    values: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

impl PerType {
    /// Visit the value of type `T`, creating it with `init` if it doesn't exist yet.
    ///
    /// `f` must not re-enter the same `PerType`.
    pub fn visit<T: Any, X>(&self, init: impl FnOnce() -> T, f: impl FnOnce(&mut T) -> X) -> X {
        let mut values = self.values.borrow_mut();
        let value = values
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(init()));
        match value.downcast_mut::<T>() {
            Some(t) => f(t),
            // Entries are only ever inserted under their own TypeId.
            None => unreachable!("type map entry has the wrong type"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_value_per_type() {
        let map = PerType::default();
        map.visit(|| 1u32, |n| *n += 1);
        map.visit(|| String::from("a"), |s| s.push('b'));
        assert_eq!(map.visit(|| 0u32, |n| *n), 2);
        assert_eq!(map.visit(String::new, |s| s.clone()), "ab");
    }
}
