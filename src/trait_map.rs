//! A map holding at most one value of each type, keyed by the value's `TypeId`.

use crate::hashing::HashMap;
use crate::{type_of, TypeId};
use std::any::Any;

#[derive(Default)]
pub struct TraitMap {
    map: HashMap<TypeId, Box<dyn Any>>,
}

impl TraitMap {
    pub fn new() -> Self {
        TraitMap {
            map: HashMap::default(),
        }
    }

    /// Inserts `value`, returning the previous value of the same type if there was one.
    pub fn insert<T: Any>(&mut self, value: T) -> Option<Box<T>> {
        self.map
            .insert(type_of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok())
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.map
            .get(&type_of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&type_of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Returns the value for `T`, inserting the result of `default` first if it is missing.
    pub fn get_or_insert_with<T: Any>(&mut self, default: impl FnOnce() -> T) -> &mut T {
        self.map
            .entry(type_of::<T>())
            .or_insert_with(|| Box::new(default()))
            .downcast_mut()
            // Only a `Box<T>` is ever stored under `type_of::<T>()`.
            .unwrap()
    }

    pub fn contains_key<T: Any>(&self) -> bool {
        self.map.contains_key(&type_of::<T>())
    }

    pub fn remove<T: Any>(&mut self) -> Option<Box<T>> {
        self.map
            .remove(&type_of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
