// query.rs - archetype-batched component queries
//
// A Query enumerates archetypes matching a required component set (and
// excluding an optional `without` set), then lazily yields
// `(Entity, &T1, ..., &Tn)` tuples archetype-by-archetype. Building the
// query only walks the component index; the actual row scan happens when
// the caller iterates.

use crate::ecs::{ArchetypeId, ArchetypeStorage, Component, ComponentId, Entity, World};

pub struct Query<'w> {
    world: &'w World,
    with: Vec<ComponentId>,
    without: Vec<ComponentId>,
}

impl<'w> Query<'w> {
    pub fn new(world: &'w World) -> Self {
        Self { world, with: Vec::new(), without: Vec::new() }
    }

    pub fn with_component(mut self, id: ComponentId) -> Self {
        self.with.push(id);
        self
    }

    pub fn without(mut self, id: ComponentId) -> Self {
        self.without.push(id);
        self
    }

    fn matching_archetypes(&self) -> Vec<ArchetypeId> {
        self.world.matching_archetypes(&self.with, &self.without)
    }

    /// Iterate every entity/component pair for a single required component
    /// type, across every matching archetype.
    pub fn iter1<T1: Component>(&self) -> impl Iterator<Item = (Entity, &'w T1)> {
        let world = self.world;
        self.matching_archetypes().into_iter().flat_map(move |arch_id| {
            let storage = world.archetype_storage(arch_id).expect("archetype vanished mid-query");
            Self::zip1::<T1>(world, storage)
        })
    }

    /// Iterate `(Entity, &T1, &T2)` across every archetype containing both.
    pub fn iter2<T1: Component, T2: Component>(&self) -> impl Iterator<Item = (Entity, &'w T1, &'w T2)> {
        let world = self.world;
        self.matching_archetypes().into_iter().flat_map(move |arch_id| {
            let storage = world.archetype_storage(arch_id).expect("archetype vanished mid-query");
            Self::zip2::<T1, T2>(world, storage)
        })
    }

    fn zip1<T1: Component>(world: &'w World, storage: &'w ArchetypeStorage) -> impl Iterator<Item = (Entity, &'w T1)> {
        let slice = storage.column_as_slice::<T1>().unwrap_or(&[]);
        (0..storage.len()).map(move |row| (entity_at(world, storage, row), &slice[row]))
    }

    fn zip2<T1: Component, T2: Component>(
        world: &'w World,
        storage: &'w ArchetypeStorage,
    ) -> impl Iterator<Item = (Entity, &'w T1, &'w T2)> {
        let a = storage.column_as_slice::<T1>().unwrap_or(&[]);
        let b = storage.column_as_slice::<T2>().unwrap_or(&[]);
        (0..storage.len()).map(move |row| (entity_at(world, storage, row), &a[row], &b[row]))
    }
}

fn entity_at(world: &World, storage: &ArchetypeStorage, row: usize) -> Entity {
    let raw = storage.entity_at(row).expect("row out of bounds");
    world.entity_for_raw(raw).expect("archetype row has no matching entity handle")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use crate::ecs::EntityBuilder;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Position {
        x: i32,
    }
    define_component!(Position, "ember_core::query::tests::Position");

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Velocity {
        x: i32,
    }
    define_component!(Velocity, "ember_core::query::tests::Velocity");

    #[test]
    fn iter1_visits_all_matching_entities() {
        let mut world = World::new();
        world.spawn(EntityBuilder::new().with(Position { x: 1 }));
        world.spawn(EntityBuilder::new().with(Position { x: 2 }).with(Velocity { x: 9 }));

        let query = Query::new(&world).with_component(Position::id());
        let sum: i32 = query.iter1::<Position>().map(|(_, p)| p.x).sum();
        assert_eq!(sum, 3);
    }

    #[test]
    fn without_excludes_archetype() {
        let mut world = World::new();
        world.spawn(EntityBuilder::new().with(Position { x: 1 }));
        world.spawn(EntityBuilder::new().with(Position { x: 2 }).with(Velocity { x: 9 }));

        let query = Query::new(&world).with_component(Position::id()).without(Velocity::id());
        let count = query.iter1::<Position>().count();
        assert_eq!(count, 1);
    }
}
