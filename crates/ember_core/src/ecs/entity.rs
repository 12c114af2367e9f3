// entity.rs - entity handles and the generational slot allocator
//
// An Entity is a stable handle: (slot, generation). The slot indexes into
// the World's location table, which tracks which archetype/row currently
// holds the entity's data. Handles stay valid across archetype moves
// (component add/remove) because they never encode a row directly.

use crate::ecs::ArchetypeId;

/// Stable handle to an entity. Two handles compare equal only if they refer
/// to the same slot *and* the same generation, so a stale handle from a
/// despawned entity never matches a later entity reusing the same slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entity {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl Entity {
    #[inline]
    pub fn slot(self) -> u32 {
        self.slot
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a single u64, e.g. for storing in a non-generic handle slot.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.slot)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            slot: (bits & 0xffff_ffff) as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// Where an entity's component data currently lives.
#[derive(Copy, Clone, Debug)]
pub struct EntityLocation {
    pub archetype: ArchetypeId,
    pub row: usize,
}

#[derive(Clone)]
struct Slot {
    generation: u32,
    location: Option<EntityLocation>,
}

/// Owns the generational slot table mapping entity handles to their current
/// archetype/row. Despawned slots are recycled via a free list; the
/// generation bump on reuse is what invalidates old handles.
#[derive(Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }

    pub fn allocate(&mut self, location: EntityLocation) -> Entity {
        if let Some(slot) = self.free.pop() {
            let s = &mut self.slots[slot as usize];
            s.location = Some(location);
            Entity { slot, generation: s.generation }
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, location: Some(location) });
            Entity { slot, generation: 0 }
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.slot as usize)
            .is_some_and(|s| s.generation == entity.generation && s.location.is_some())
    }

    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        let s = self.slots.get(entity.slot as usize)?;
        if s.generation != entity.generation {
            return None;
        }
        s.location
    }

    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        debug_assert!(self.is_alive(entity));
        self.slots[entity.slot as usize].location = Some(location);
    }

    /// Free the slot, bumping its generation so stale handles stop resolving.
    /// Returns the location the entity occupied, if it was alive.
    pub fn free(&mut self, entity: Entity) -> Option<EntityLocation> {
        let s = self.slots.get_mut(entity.slot as usize)?;
        if s.generation != entity.generation || s.location.is_none() {
            return None;
        }
        let location = s.location.take();
        s.generation = s.generation.wrapping_add(1);
        self.free.push(entity.slot);
        location
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.location.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_slot_bumps_generation() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate(EntityLocation { archetype: 1, row: 0 });
        alloc.free(e1);
        let e2 = alloc.allocate(EntityLocation { archetype: 2, row: 0 });
        assert_eq!(e1.slot, e2.slot);
        assert_ne!(e1.generation, e2.generation);
        assert!(!alloc.is_alive(e1));
        assert!(alloc.is_alive(e2));
    }

    #[test]
    fn set_location_moves_entity() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate(EntityLocation { archetype: 1, row: 3 });
        alloc.set_location(e, EntityLocation { archetype: 2, row: 0 });
        assert_eq!(alloc.location(e).unwrap().archetype, 2);
    }
}
