// archetype_storage.rs - SoA storage for all entities of one archetype
//
// Structure-of-Arrays layout: each component type gets its own packed
// Column, indexed in parallel by row. Rows are removed via swap-remove, so
// a row's occupant can change out from under you after a despawn/move on a
// *different* entity - always re-resolve through the World's entity
// location table rather than caching a row across such a call.

use std::collections::HashMap;

use crate::ecs::{meta_of, Archetype, Component, ComponentId};

use super::column::Column;

pub struct ArchetypeStorage {
    pub archetype: Archetype,
    pub(crate) columns: HashMap<ComponentId, Column>,
    entity_ids: Vec<u64>,
}

impl ArchetypeStorage {
    pub fn new(archetype: Archetype) -> Self {
        let mut columns = HashMap::new();
        for &cid in &archetype.components {
            let meta = meta_of(cid).expect("component not registered");
            columns.insert(cid, Column::new(&meta));
        }
        Self { archetype, columns, entity_ids: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    pub fn entity_at(&self, row: usize) -> Option<u64> {
        self.entity_ids.get(row).copied()
    }

    pub fn entity_ids(&self) -> &[u64] {
        &self.entity_ids
    }

    /// Append a new row with component bytes supplied by `components`
    /// (must cover exactly this archetype's component set). Returns the
    /// new row index.
    pub(crate) fn push_row(&mut self, entity_id: u64, components: &[(ComponentId, Vec<u8>)]) -> usize {
        for (cid, bytes) in components {
            self.columns.get_mut(cid).expect("column missing for archetype component").push_bytes(bytes);
        }
        self.entity_ids.push(entity_id);
        self.entity_ids.len() - 1
    }

    /// Remove a row via swap-remove, dropping its component values.
    /// Returns the entity id that now occupies `row` after the swap, if any
    /// entity other than the removed one was moved into it.
    pub(crate) fn remove_row(&mut self, row: usize) -> Option<u64> {
        for col in self.columns.values_mut() {
            col.swap_remove_drop(row);
        }
        let last = self.entity_ids.len() - 1;
        if row != last {
            self.entity_ids.swap_remove(row);
            Some(self.entity_ids[row])
        } else {
            self.entity_ids.pop();
            None
        }
    }

    /// Remove a row via swap-remove *without* dropping, returning the raw
    /// bytes of every component so they can be relocated into another
    /// archetype. Returns (component bytes, swapped-in entity id if any).
    pub(crate) fn take_row(&mut self, row: usize) -> (Vec<(ComponentId, Vec<u8>)>, Option<u64>) {
        let mut taken = Vec::with_capacity(self.columns.len());
        for (&cid, col) in self.columns.iter_mut() {
            let (bytes, _moved) = col.swap_remove_take(row);
            taken.push((cid, bytes));
        }
        let last = self.entity_ids.len() - 1;
        let swapped = if row != last {
            self.entity_ids.swap_remove(row);
            Some(self.entity_ids[row])
        } else {
            self.entity_ids.pop();
            None
        };
        (taken, swapped)
    }

    pub(crate) fn write_component(&mut self, row: usize, cid: ComponentId, bytes: &[u8]) {
        self.columns.get_mut(&cid).expect("column not present in archetype").write_row(row, bytes);
    }

    pub(crate) fn row_bytes(&self, cid: ComponentId, row: usize) -> Option<&[u8]> {
        self.columns.get(&cid).map(|c| c.row_bytes(row))
    }

    pub fn column_as_slice<T: Component>(&self) -> Option<&[T]> {
        let col = self.columns.get(&T::id())?;
        Some(unsafe { col.as_slice::<T>() })
    }

    pub fn column_as_slice_mut<T: Component>(&mut self) -> Option<&mut [T]> {
        let col = self.columns.get_mut(&T::id())?;
        Some(unsafe { col.as_slice_mut::<T>() })
    }

    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        let col = self.columns.get(&T::id())?;
        Some(unsafe { col.get::<T>(row) })
    }

    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        let col = self.columns.get_mut(&T::id())?;
        Some(unsafe { col.get_mut::<T>(row) })
    }
}
