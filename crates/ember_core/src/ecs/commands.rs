// commands.rs - immediate-mutation facade over World/Resources/Events
//
// Unlike deferred-command patterns in other ECS designs, `Commands` here
// applies every mutation to the World the moment it's called - there is no
// queue to flush at the end of the frame. It exists purely to give
// systems a single, ergonomic entry point instead of threading `&mut
// World` plus `&mut Resources` plus `&mut Events` through every call site.

use crate::ecs::{Bundle, Component, Entity, EntityBuilder, EventReader, Events, Resources, World, WorldError};

pub struct Commands<'a> {
    world: &'a mut World,
    resources: &'a mut Resources,
    events: &'a mut Events,
}

impl<'a> Commands<'a> {
    pub fn new(world: &'a mut World, resources: &'a mut Resources, events: &'a mut Events) -> Self {
        Self { world, resources, events }
    }

    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        let builder = bundle.add_to(EntityBuilder::new());
        self.world.spawn(builder)
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        self.world.set_component(entity, value)
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        self.world.remove_component::<T>(entity)
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get_component::<T>(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.world.get_component_mut::<T>(entity)
    }

    pub fn resource<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.resources.get::<T>()
    }

    pub fn resource_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut T> {
        self.resources.get_mut::<T>()
    }

    pub fn insert_resource<T: 'static + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.resources.insert(value)
    }

    pub fn send_event<T: Send + Sync + 'static>(&mut self, event: T) {
        self.events.send(event);
    }

    /// Read-only view of the event channels, for systems that keep their
    /// own `EventReader<T>` (typically stashed in a resource) across ticks.
    pub fn events(&self) -> &Events {
        self.events
    }

    /// Fresh cursor for `T`, starting from "now". Systems that need a
    /// cursor which survives across invocations should create it once
    /// (e.g. on first run, storing it in a resource) rather than calling
    /// this every tick - a fresh reader never sees events sent before it
    /// was created.
    pub fn reader<T: Send + Sync + 'static>(&self) -> EventReader<T> {
        self.events.reader::<T>()
    }

    /// Drain every event of type `T` the given reader hasn't seen yet.
    pub fn read_events<'r, T: Send + Sync + 'static>(&self, reader: &'r mut EventReader<T>) -> Vec<&T> {
        self.events.read(reader)
    }

    pub fn world(&self) -> &World {
        self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    /// Make `child` a child of `parent` by giving it a `Parent` component,
    /// and appending it to the parent's `Children` list (creating one if
    /// this is the parent's first child).
    pub fn set_parent(&mut self, child: Entity, parent: Entity) {
        let _ = self.world.set_component(child, Parent(parent));
        if let Some(children) = self.world.get_component_mut::<Children>(parent) {
            if !children.0.contains(&child) {
                children.0.push(child);
            }
        } else {
            let _ = self.world.set_component(parent, Children(vec![child]));
        }
    }

    /// Remove `child` from its current parent's `Children` list and strip
    /// its own `Parent` component. No-op if it had no parent.
    pub fn clear_parent(&mut self, child: Entity) {
        if let Some(&Parent(parent)) = self.world.get_component::<Parent>(child) {
            if let Some(children) = self.world.get_component_mut::<Children>(parent) {
                children.0.retain(|&c| c != child);
            }
            self.world.remove_component::<Parent>(child);
        }
    }
}

/// Points at an entity's parent in a scene-graph hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parent(pub Entity);
crate::define_component!(Parent, "ember_core::ecs::commands::Parent");

/// The ordered list of an entity's direct children.
#[derive(Clone, Debug, Default)]
pub struct Children(pub Vec<Entity>);
crate::define_component!(Children, "ember_core::ecs::commands::Children", pod = false);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Clone, Copy)]
    struct Marker;
    define_component!(Marker, "ember_core::ecs::commands::tests::Marker");

    #[test]
    fn spawn_and_despawn_through_commands() {
        let mut world = World::new();
        let mut resources = Resources::new();
        let mut events = Events::new();
        let mut commands = Commands::new(&mut world, &mut resources, &mut events);

        let entity = commands.spawn(Marker);
        assert!(commands.get_component::<Marker>(entity).is_some());
        assert!(commands.despawn(entity));
        assert!(!commands.world().is_alive(entity));
    }

    #[test]
    fn set_parent_links_both_directions() {
        let mut world = World::new();
        let mut resources = Resources::new();
        let mut events = Events::new();
        let mut commands = Commands::new(&mut world, &mut resources, &mut events);

        let parent = commands.spawn(Marker);
        let child = commands.spawn(Marker);
        commands.set_parent(child, parent);

        assert_eq!(commands.get_component::<Parent>(child), Some(&Parent(parent)));
        assert_eq!(commands.get_component::<Children>(parent).unwrap().0, vec![child]);
    }

    #[test]
    fn clear_parent_removes_both_directions() {
        let mut world = World::new();
        let mut resources = Resources::new();
        let mut events = Events::new();
        let mut commands = Commands::new(&mut world, &mut resources, &mut events);

        let parent = commands.spawn(Marker);
        let child = commands.spawn(Marker);
        commands.set_parent(child, parent);
        commands.clear_parent(child);

        assert!(commands.get_component::<Parent>(child).is_none());
        assert!(commands.get_component::<Children>(parent).unwrap().0.is_empty());
    }
}
