// world.rs - ECS World: entity lifecycle, component storage, and queries.

use std::collections::HashMap;
use thiserror::Error;

use crate::ecs::entity::{EntityAllocator, EntityLocation};
use crate::ecs::{meta_of, Archetype, ArchetypeId, ArchetypeStorage, Component, ComponentId, Entity, EntityBuilder};

/// Errors a `World` operation can fail with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("entity is not alive")]
    EntityGone,
}

/// The ECS world: owns every entity's component data, organized by
/// archetype. Adding or removing a component moves the entity's row into a
/// different archetype's storage; the entity's handle stays valid across
/// the move.
pub struct World {
    next_entity_raw_id: u64,
    entities: EntityAllocator,
    entity_to_raw: HashMap<Entity, u64>,
    raw_to_entity: HashMap<u64, Entity>,
    storages: HashMap<ArchetypeId, ArchetypeStorage>,
    comp_index: HashMap<ComponentId, Vec<ArchetypeId>>,
}

impl World {
    pub fn new() -> Self {
        Self {
            next_entity_raw_id: 1,
            entities: EntityAllocator::new(),
            entity_to_raw: HashMap::new(),
            raw_to_entity: HashMap::new(),
            storages: HashMap::new(),
            comp_index: HashMap::new(),
        }
    }

    fn ensure_storage(&mut self, archetype: &Archetype) -> ArchetypeId {
        if !self.storages.contains_key(&archetype.id) {
            self.storages.insert(archetype.id, ArchetypeStorage::new(archetype.clone()));
            for &cid in &archetype.components {
                self.comp_index.entry(cid).or_default().push(archetype.id);
            }
        }
        archetype.id
    }

    pub fn spawn(&mut self, builder: EntityBuilder) -> Entity {
        let archetype = builder.archetype();
        let arch_id = self.ensure_storage(&archetype);

        let raw_id = self.next_entity_raw_id;
        self.next_entity_raw_id += 1;

        let components = builder.into_components();
        let row = self.storages.get_mut(&arch_id).unwrap().push_row(raw_id, &components);

        let entity = self.entities.allocate(EntityLocation { archetype: arch_id, row });
        self.entity_to_raw.insert(entity, raw_id);
        self.raw_to_entity.insert(raw_id, entity);
        entity
    }

    /// Despawn an entity, dropping its component data. Returns `false` if
    /// the handle was already stale.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let Some(location) = self.entities.free(entity) else { return false };
        if let Some(raw_id) = self.entity_to_raw.remove(&entity) {
            self.raw_to_entity.remove(&raw_id);
        }
        if let Some(storage) = self.storages.get_mut(&location.archetype) {
            if let Some(swapped_raw_id) = storage.remove_row(location.row) {
                self.retarget_raw_id(swapped_raw_id, location.archetype, location.row);
            }
        }
        true
    }

    /// After a swap-remove, the entity that used to be at the storage's
    /// last row is now at `row`; fix up its recorded location.
    fn retarget_raw_id(&mut self, raw_id: u64, archetype: ArchetypeId, row: usize) {
        if let Some(&entity) = self.raw_to_entity.get(&raw_id) {
            self.entities.set_location(entity, EntityLocation { archetype, row });
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Resolve the stable internal row id stored alongside a storage row
    /// back to its public `Entity` handle. Used by `Query` when yielding
    /// `(Entity, &T, ...)` tuples while walking raw archetype storage.
    pub fn entity_for_raw(&self, raw_id: u64) -> Option<Entity> {
        self.raw_to_entity.get(&raw_id).copied()
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let location = self.entities.location(entity)?;
        self.storages.get(&location.archetype)?.get::<T>(location.row)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let location = self.entities.location(entity)?;
        self.storages.get_mut(&location.archetype)?.get_mut::<T>(location.row)
    }

    pub fn has_component(&self, entity: Entity, id: ComponentId) -> bool {
        self.entities
            .location(entity)
            .and_then(|loc| self.storages.get(&loc.archetype))
            .is_some_and(|s| s.archetype.contains(id))
    }

    /// Set (insert or overwrite) a component on an already-spawned entity.
    /// If the entity's archetype doesn't yet include this component type,
    /// the entity is moved: every other component's bytes are relocated
    /// into the destination archetype's storage, the new component is
    /// pushed, and the old row is swap-removed.
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        let Some(location) = self.entities.location(entity) else { return Err(WorldError::EntityGone) };
        let id = T::id();
        let bytes = unsafe {
            let ptr = &value as *const T as *const u8;
            std::slice::from_raw_parts(ptr, std::mem::size_of::<T>()).to_vec()
        };
        std::mem::forget(value);

        let already_has = self.storages.get(&location.archetype).is_some_and(|s| s.archetype.contains(id));
        if already_has {
            self.storages.get_mut(&location.archetype).unwrap().write_component(location.row, id, &bytes);
            return Ok(());
        }

        self.move_entity(entity, location, |arch| arch.with_component(id), move |extra| {
            extra.push((id, bytes));
        });
        Ok(())
    }

    /// Remove a component from an entity, moving it to the archetype
    /// without that component type. No-op (returns `false`) if the entity
    /// didn't have it.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        let Some(location) = self.entities.location(entity) else { return false };
        let id = T::id();
        let has = self.storages.get(&location.archetype).is_some_and(|s| s.archetype.contains(id));
        if !has {
            return false;
        }
        self.move_entity(entity, location, |arch| arch.without_component(id), |_| {});
        true
    }

    /// Core archetype-move machinery shared by set/remove. `next_archetype`
    /// computes the destination archetype from the current one; `extra`
    /// lets the caller append a freshly-provided component's bytes to the
    /// set relocated from the old row (used by `set_component` when adding
    /// a brand new component type).
    fn move_entity(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        next_archetype: impl FnOnce(&Archetype) -> Archetype,
        extra: impl FnOnce(&mut Vec<(ComponentId, Vec<u8>)>),
    ) {
        let raw_id = *self.entity_to_raw.get(&entity).expect("entity missing raw id");
        let old_archetype = self.storages.get(&location.archetype).unwrap().archetype.clone();
        let new_archetype = next_archetype(&old_archetype);
        let new_arch_id = self.ensure_storage(&new_archetype);

        let (mut moved_components, swapped_raw_id) = {
            let storage = self.storages.get_mut(&location.archetype).unwrap();
            storage.take_row(location.row)
        };
        if let Some(swapped) = swapped_raw_id {
            self.retarget_raw_id(swapped, location.archetype, location.row);
        }

        // Drop bytes for any component not present in the destination
        // archetype (only relevant for remove_component).
        moved_components.retain(|(cid, bytes)| {
            if new_archetype.contains(*cid) {
                true
            } else {
                if let Some(meta) = meta_of(*cid) {
                    if let Some(drop_fn) = meta.drop_fn {
                        let mut bytes = bytes.clone();
                        unsafe { drop_fn(bytes.as_mut_ptr()) };
                    }
                }
                false
            }
        });
        extra(&mut moved_components);

        let new_row = self.storages.get_mut(&new_arch_id).unwrap().push_row(raw_id, &moved_components);
        self.entities.set_location(entity, EntityLocation { archetype: new_arch_id, row: new_row });
    }

    pub fn archetypes_with(&self, cid: ComponentId) -> &[ArchetypeId] {
        self.comp_index.get(&cid).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Archetype ids containing all of `with` and none of `without`.
    pub fn matching_archetypes(&self, with: &[ComponentId], without: &[ComponentId]) -> Vec<ArchetypeId> {
        if with.is_empty() {
            return self.storages.keys().copied().filter(|id| {
                let arch = &self.storages[id].archetype;
                without.iter().all(|w| !arch.contains(*w))
            }).collect();
        }
        let mut result: Vec<ArchetypeId> = self.archetypes_with(with[0]).to_vec();
        for &cid in &with[1..] {
            let archs = self.archetypes_with(cid);
            result.retain(|a| archs.contains(a));
        }
        result.retain(|a| {
            let arch = &self.storages[a].archetype;
            without.iter().all(|w| !arch.contains(*w))
        });
        result
    }

    pub fn archetype_storage(&self, archetype: ArchetypeId) -> Option<&ArchetypeStorage> {
        self.storages.get(&archetype)
    }

    pub fn archetype_storage_mut(&mut self, archetype: ArchetypeId) -> Option<&mut ArchetypeStorage> {
        self.storages.get_mut(&archetype)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.live_count()
    }

    pub fn archetypes(&self) -> impl Iterator<Item = &ArchetypeStorage> {
        self.storages.values()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Position {
        x: i32,
        y: i32,
    }
    define_component!(Position, "ember_core::world::tests::Position");

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Velocity {
        x: i32,
        y: i32,
    }
    define_component!(Velocity, "ember_core::world::tests::Velocity");

    #[test]
    fn spawn_and_read_component() {
        let mut world = World::new();
        let e = world.spawn(EntityBuilder::new().with(Position { x: 1, y: 2 }));
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1, y: 2 }));
    }

    #[test]
    fn despawn_invalidates_handle() {
        let mut world = World::new();
        let e = world.spawn(EntityBuilder::new().with(Position { x: 0, y: 0 }));
        assert!(world.despawn(e));
        assert!(!world.is_alive(e));
        assert_eq!(world.get_component::<Position>(e), None);
    }

    #[test]
    fn despawn_fixes_up_swapped_entity_location() {
        let mut world = World::new();
        let e1 = world.spawn(EntityBuilder::new().with(Position { x: 1, y: 1 }));
        let e2 = world.spawn(EntityBuilder::new().with(Position { x: 2, y: 2 }));
        world.despawn(e1);
        assert_eq!(world.get_component::<Position>(e2), Some(&Position { x: 2, y: 2 }));
    }

    #[test]
    fn set_component_moves_entity_to_new_archetype() {
        let mut world = World::new();
        let e = world.spawn(EntityBuilder::new().with(Position { x: 5, y: 5 }));
        assert!(world.set_component(e, Velocity { x: 1, y: 0 }).is_ok());
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 5, y: 5 }));
        assert_eq!(world.get_component::<Velocity>(e), Some(&Velocity { x: 1, y: 0 }));
    }

    #[test]
    fn set_component_on_a_despawned_entity_is_entity_gone() {
        let mut world = World::new();
        let e = world.spawn(EntityBuilder::new().with(Position { x: 0, y: 0 }));
        world.despawn(e);
        assert_eq!(world.set_component(e, Velocity { x: 1, y: 0 }), Err(WorldError::EntityGone));
    }

    #[test]
    fn remove_component_moves_entity_back() {
        let mut world = World::new();
        let e = world.spawn(EntityBuilder::new().with(Position { x: 0, y: 0 }).with(Velocity { x: 1, y: 1 }));
        assert!(world.remove_component::<Velocity>(e));
        assert_eq!(world.get_component::<Velocity>(e), None);
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 0, y: 0 }));
    }

    #[test]
    fn matching_archetypes_filters_without() {
        let mut world = World::new();
        world.spawn(EntityBuilder::new().with(Position { x: 0, y: 0 }));
        world.spawn(EntityBuilder::new().with(Position { x: 0, y: 0 }).with(Velocity { x: 0, y: 0 }));
        let matches = world.matching_archetypes(&[Position::id()], &[Velocity::id()]);
        assert_eq!(matches.len(), 1);
    }
}
