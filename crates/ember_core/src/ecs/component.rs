// component.rs - component type registry
//
// Components are identified by a stable, process-wide ComponentId assigned
// on first use. Layout (size/align/stride) is recorded once; re-registering
// the same name with a different layout is a programming error and panics.

use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::RwLock;

pub type ComponentId = u32;

/// Drops a single logical element in place given a pointer to its first byte.
///
/// # Safety
/// `ptr` must point to a valid, initialized `T` and must not be read again
/// after this call.
pub type DropFn = unsafe fn(*mut u8);

unsafe fn drop_in_place_as<T>(ptr: *mut u8) {
    std::ptr::drop_in_place(ptr as *mut T);
}

/// Runtime metadata for a component's memory layout.
#[derive(Clone)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub stride: usize,
    pub pod: bool,
    pub(crate) drop_fn: Option<DropFn>,
}

impl std::fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("pod", &self.pod)
            .finish()
    }
}

struct Registry {
    by_id: HashMap<ComponentId, ComponentMeta>,
    by_name: HashMap<&'static str, ComponentId>,
    next_id: ComponentId,
}

static REG: Lazy<RwLock<Registry>> = Lazy::new(|| {
    RwLock::new(Registry {
        by_id: HashMap::new(),
        by_name: HashMap::new(),
        next_id: 1,
    })
});

fn register_inner(name: &'static str, size: usize, align: usize, pod: bool, drop_fn: Option<DropFn>) -> ComponentId {
    assert!(align.is_power_of_two(), "align must be a power of two");
    let stride = size.next_multiple_of(align.max(1));

    let mut reg = REG.write().unwrap();
    if let Some(&id) = reg.by_name.get(name) {
        let m = reg.by_id.get(&id).unwrap();
        assert_eq!(m.size, size, "component '{name}' size changed since first registration");
        assert_eq!(m.align, align, "component '{name}' align changed since first registration");
        assert_eq!(m.pod, pod, "component '{name}' POD flag changed since first registration");
        return id;
    }

    let id = reg.next_id;
    reg.next_id = id.checked_add(1).expect("component id space exhausted");
    let meta = ComponentMeta { id, name, size, align, stride, pod, drop_fn };
    reg.by_name.insert(name, id);
    reg.by_id.insert(id, meta);
    id
}

/// Look up component metadata by id.
pub fn meta_of(id: ComponentId) -> Option<ComponentMeta> {
    REG.read().unwrap().by_id.get(&id).cloned()
}

/// Look up a component id by registered name.
pub fn id_of_name(name: &str) -> Option<ComponentId> {
    REG.read().unwrap().by_name.get(name).copied()
}

/// Trait implemented by every Rust type usable as an ECS component.
///
/// Implement via [`define_component!`] rather than by hand; the macro wires
/// up the drop function correctly for non-POD types.
pub trait Component: 'static + Send + Sync {
    const NAME: &'static str;

    /// Whether the type has no `Drop` impl and can be byte-copied/forgotten
    /// safely. Override to `false` for anything owning a heap allocation,
    /// handle, or other resource.
    fn is_pod() -> bool {
        false
    }

    fn id() -> ComponentId
    where
        Self: Sized,
    {
        static CACHE: OnceCell<ComponentId> = OnceCell::new();
        *CACHE.get_or_init(|| {
            let size = std::mem::size_of::<Self>();
            let align = std::mem::align_of::<Self>();
            let pod = Self::is_pod();
            let drop_fn = if pod { None } else { Some(drop_in_place_as::<Self> as DropFn) };
            register_inner(Self::NAME, size, align, pod, drop_fn)
        })
    }

    fn ensure_registered()
    where
        Self: Sized,
    {
        let _ = Self::id();
    }
}

/// Implements [`Component`] for a type.
///
/// ```ignore
/// #[derive(Clone, Copy)]
/// struct Position { x: f32, y: f32 }
/// define_component!(Position, "Position");
/// ```
///
/// For a type with a `Drop` impl or owned resources, pass `pod = false`:
/// `define_component!(Inventory, "Inventory", pod = false);`
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $name:expr) => {
        impl $crate::ecs::Component for $ty {
            const NAME: &'static str = $name;
            fn is_pod() -> bool {
                true
            }
        }
    };
    ($ty:ty, $name:expr, pod = false) => {
        impl $crate::ecs::Component for $ty {
            const NAME: &'static str = $name;
            fn is_pod() -> bool {
                false
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct TestPos {
        #[allow(dead_code)]
        x: f32,
    }
    define_component!(TestPos, "ember_core::component::tests::TestPos");

    #[test]
    fn id_is_stable_across_calls() {
        let a = TestPos::id();
        let b = TestPos::id();
        assert_eq!(a, b);
    }

    #[test]
    fn meta_round_trips() {
        let id = TestPos::id();
        let meta = meta_of(id).unwrap();
        assert_eq!(meta.size, std::mem::size_of::<TestPos>());
        assert!(meta.pod);
        assert!(meta.drop_fn.is_none());
    }
}
