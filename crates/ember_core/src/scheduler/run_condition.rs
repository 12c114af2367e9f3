// run_condition.rs - the read-only view run-if predicates evaluate against.
//
// Predicates see the world the same way a system would, but only by shared
// reference: evaluating the run-gate happens before the scheduler takes
// the mutable borrow it needs to build that system's `Commands`, so the
// two never alias.

use crate::ecs::{Component, Entity, Events, Resources, World};

pub struct RunGateContext<'a> {
    world: &'a World,
    resources: &'a Resources,
    events: &'a Events,
}

impl<'a> RunGateContext<'a> {
    pub fn new(world: &'a World, resources: &'a Resources, events: &'a Events) -> Self {
        Self { world, resources, events }
    }

    pub fn world(&self) -> &World {
        self.world
    }

    pub fn resources(&self) -> &Resources {
        self.resources
    }

    pub fn events(&self) -> &Events {
        self.events
    }

    pub fn resource<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.resources.get::<T>()
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        T::ensure_registered();
        self.world.has_component(entity, T::id())
    }
}

pub type RunCondition = Box<dyn Fn(&RunGateContext) -> bool + Send + Sync>;
