// mod.rs - storage module exports

mod archetype_storage;
mod column;

pub use archetype_storage::ArchetypeStorage;
