// resources.rs - a type-keyed map of singleton values shared across systems
//
// Resources are for data that doesn't belong to any one entity: the asset
// server, the active input state, frame timing, render device handles.

use std::any::{Any, TypeId};
use std::collections::HashMap;

#[derive(Default)]
pub struct Resources {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .map(|old| *old.downcast::<T>().expect("resource type mismatch"))
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>()).map(|b| b.downcast_ref::<T>().expect("resource type mismatch"))
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.values.get_mut(&TypeId::of::<T>()).map(|b| b.downcast_mut::<T>().expect("resource type mismatch"))
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.values.remove(&TypeId::of::<T>()).map(|b| *b.downcast::<T>().expect("resource type mismatch"))
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct FrameCount(u64);

    #[test]
    fn insert_and_get_round_trip() {
        let mut resources = Resources::new();
        resources.insert(FrameCount(3));
        assert_eq!(resources.get::<FrameCount>(), Some(&FrameCount(3)));
    }

    #[test]
    fn missing_resource_is_none() {
        let resources = Resources::new();
        assert_eq!(resources.get::<FrameCount>(), None);
    }
}
