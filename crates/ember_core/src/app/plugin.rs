// plugin.rs - the four-hook lifecycle every plugin can participate in.
//
// `build` is called synchronously in registration order and is where a
// plugin registers its systems and inserts its resources; a plugin that
// also has slow asynchronous setup to do (connecting to a device, probing
// a filesystem adapter) kicks that work off here and polls it from its own
// `ready`, using whatever internal state the plugin likes - the App never
// needs to see the future. This keeps the App's own lifecycle plumbing
// entirely synchronous while still letting "build may be asynchronous, but
// its completion is not awaited before proceeding" hold: the App always
// proceeds past `build` the instant the call returns, regardless of
// whether the plugin's own async work has settled yet.

use crate::ecs::Resources;
use crate::scheduler::Scheduler;
use std::any::{Any, TypeId};

/// Context a plugin's hooks mutate against: the system registry and the
/// shared resource table. Intentionally does not expose `World` or
/// `Events` directly - plugins register systems that will themselves
/// receive `Commands` when run; they don't act on the world at build time.
pub struct PluginContext<'a> {
    pub scheduler: &'a mut Scheduler,
    pub resources: &'a mut Resources,
}

pub trait Plugin: Any + Send {
    /// Human-readable name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether registering this plugin twice is permitted. Most plugins
    /// are singletons; a plugin that legitimately wants multiple
    /// instances (e.g. one per input device) overrides this to `false`.
    fn is_unique(&self) -> bool {
        true
    }

    /// Other plugin types that must finish before this one's `ready`/
    /// `finish` are considered.
    fn dependencies(&self) -> Vec<TypeId> {
        Vec::new()
    }

    /// Register systems and insert resources. Called once per plugin, in
    /// registration order, before any `ready` polling begins.
    fn build(&mut self, context: &mut PluginContext);

    /// Readiness probe, polled repeatedly by the App's fixed-point loop
    /// until it returns `true` or the 30-second cap elapses. Default:
    /// ready immediately.
    fn ready(&mut self, context: &mut PluginContext) -> bool {
        let _ = context;
        true
    }

    /// Post-ready setup, called once as soon as `ready` first returns
    /// true and all declared dependencies have already finished.
    fn finish(&mut self, context: &mut PluginContext) {
        let _ = context;
    }

    /// Teardown, called once in registration order before App shutdown.
    fn cleanup(&mut self, context: &mut PluginContext) {
        let _ = context;
    }
}
