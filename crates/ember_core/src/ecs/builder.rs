// builder.rs - EntityBuilder for constructing entities
//
// Collects components before spawning so the archetype is computed once,
// and the entity can be pushed straight into its final storage row with no
// migration needed.

use std::collections::HashMap;

use crate::ecs::{meta_of, Archetype, Component, ComponentId};

pub struct EntityBuilder {
    components: HashMap<ComponentId, Vec<u8>>,
}

impl EntityBuilder {
    pub fn new() -> Self {
        Self { components: HashMap::new() }
    }

    /// Add a Rust-typed component. The value is byte-copied into the
    /// builder and then forgotten (not dropped) - ownership of its bytes,
    /// including any heap allocation, now lives in the builder until the
    /// entity is spawned.
    pub fn with<T: Component>(mut self, value: T) -> Self {
        T::ensure_registered();
        let id = T::id();

        let bytes = unsafe {
            let ptr = &value as *const T as *const u8;
            std::slice::from_raw_parts(ptr, std::mem::size_of::<T>()).to_vec()
        };
        std::mem::forget(value);

        if let Some(prev) = self.components.insert(id, bytes) {
            Self::drop_bytes(id, prev);
        }
        self
    }

    /// Add a component by raw bytes (for dynamically registered types).
    ///
    /// # Panics
    /// Panics if `bytes.len() != expected_size`.
    pub fn with_raw(mut self, id: ComponentId, bytes: Vec<u8>, expected_size: usize) -> Self {
        assert_eq!(bytes.len(), expected_size, "raw component size mismatch for id={id}");
        if let Some(prev) = self.components.insert(id, bytes) {
            Self::drop_bytes(id, prev);
        }
        self
    }

    pub fn has(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    fn drop_bytes(id: ComponentId, mut bytes: Vec<u8>) {
        if let Some(meta) = meta_of(id) {
            if let Some(drop_fn) = meta.drop_fn {
                unsafe { drop_fn(bytes.as_mut_ptr()) };
            }
        }
    }

    pub fn archetype(&self) -> Archetype {
        let ids: Vec<ComponentId> = self.components.keys().copied().collect();
        Archetype::from_components(ids)
    }

    pub fn into_components(self) -> Vec<(ComponentId, Vec<u8>)> {
        let mut v: Vec<_> = self.components.into_iter().collect();
        v.sort_by_key(|(id, _)| *id);
        v
    }
}

impl Default for EntityBuilder {
    fn default() -> Self {
        Self::new()
    }
}
