// app - owns the world/scheduler/events/resources and drives the main loop.
//
// Phase order per tick: `Startup` (once, before the loop begins) then every
// frame `PreUpdate -> Update -> PostUpdate -> [PreFixedUpdate -> FixedUpdate
// -> PostFixedUpdate]* -> PreRender -> Render -> PostRender`, where the
// bracketed group runs however many times the fixed-step accumulator says
// are due for this frame's real delta time.

mod plugin;

pub use plugin::{Plugin, PluginContext};

use crate::ecs::{Events, Resources, World};
use crate::scheduler::{Phase, Scheduler, SchedulerDiagnostic, SystemHandle};
use crate::time::{FixedStepAccumulator, SimulationTime};
use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cap on the plugin-ready fixed-point loop (spec: 30 seconds).
const PLUGIN_READY_CAP: Duration = Duration::from_secs(30);

/// One frame's worth of host-supplied timing. The App never reads the
/// system clock itself; the host owns the frame callback and hands in a
/// monotonic delta.
#[derive(Copy, Clone, Debug)]
pub struct FrameInput {
    pub delta_seconds: f64,
}

/// Everything that happened while running one frame's systems: per-system
/// errors (non-fatal; surfaced to the owner) and scheduler diagnostics
/// accumulated since the last call.
#[derive(Default)]
pub struct FrameReport {
    pub system_errors: Vec<(Phase, SystemHandle, anyhow::Error)>,
    pub diagnostics: Vec<SchedulerDiagnostic>,
}

struct InstalledPlugin {
    type_id: TypeId,
    plugin: Box<dyn Plugin>,
    finished: bool,
}

pub struct App {
    world: World,
    scheduler: Scheduler,
    events: Events,
    resources: Resources,
    sim_time: SimulationTime,
    accumulator: FixedStepAccumulator,
    plugins: Vec<InstalledPlugin>,
    diagnostics: Vec<SchedulerDiagnostic>,
    shutdown_requested: Arc<AtomicBool>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            world: World::new(),
            scheduler: Scheduler::new(),
            events: Events::new(),
            resources: Resources::new(),
            sim_time: SimulationTime::new(),
            accumulator: FixedStepAccumulator::new(),
            plugins: Vec::new(),
            diagnostics: Vec::new(),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn sim_time(&self) -> &SimulationTime {
        &self.sim_time
    }

    /// Shared flag the host can clone out and hand to something that
    /// detects fatal failures on another thread (e.g.
    /// `ember_render::device::GpuDevice::watch_for_loss`), then poll via
    /// `shutdown_requested` to know when to stop calling `update`.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown_requested.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Register a plugin. A no-op if a plugin with the same concrete type
    /// is already installed, unless it declares `is_unique() == false`.
    pub fn add_plugin<P: Plugin + 'static>(&mut self, plugin: P) -> &mut Self {
        let type_id = TypeId::of::<P>();
        if !plugin.is_unique() || !self.plugins.iter().any(|p| p.type_id == type_id) {
            self.plugins.push(InstalledPlugin { type_id, plugin: Box::new(plugin), finished: false });
        }
        self
    }

    /// Run every installed plugin's `build`, then drive the `ready`/
    /// `finish` fixed-point loop until every plugin has finished or the
    /// 30-second cap elapses (whichever first; unfinished plugins are
    /// skipped with a `PluginNotReady` diagnostic). Call once before the
    /// first `startup`.
    pub fn install_plugins(&mut self) {
        for installed in &mut self.plugins {
            let mut context = PluginContext { scheduler: &mut self.scheduler, resources: &mut self.resources };
            installed.plugin.build(&mut context);
        }

        let deadline = Instant::now() + PLUGIN_READY_CAP;
        loop {
            let finished_ids: Vec<TypeId> = self.plugins.iter().filter(|p| p.finished).map(|p| p.type_id).collect();
            let mut made_progress = false;

            for i in 0..self.plugins.len() {
                if self.plugins[i].finished {
                    continue;
                }
                let deps_satisfied = self.plugins[i].plugin.dependencies().iter().all(|dep| finished_ids.contains(dep));
                if !deps_satisfied {
                    continue;
                }
                let mut context = PluginContext { scheduler: &mut self.scheduler, resources: &mut self.resources };
                if self.plugins[i].plugin.ready(&mut context) {
                    self.plugins[i].plugin.finish(&mut context);
                    self.plugins[i].finished = true;
                    made_progress = true;
                }
            }

            if self.plugins.iter().all(|p| p.finished) {
                break;
            }
            if Instant::now() >= deadline {
                for installed in &self.plugins {
                    if !installed.finished {
                        self.diagnostics.push(SchedulerDiagnostic::PluginNotReady { plugin: installed.plugin.name().to_string() });
                    }
                }
                break;
            }
            if !made_progress {
                std::thread::yield_now();
            }
        }
    }

    /// Run the `Startup` phase once. Any async startup systems are
    /// awaited (see `scheduler::schedule`) before this returns.
    pub fn startup(&mut self) -> FrameReport {
        let failures = self.scheduler.run_phase(Phase::Startup, &mut self.world, &mut self.resources, &mut self.events);
        self.finish_frame(vec![(Phase::Startup, failures)])
    }

    /// Run one frame: `PreUpdate -> Update -> PostUpdate`, then as many
    /// `PreFixedUpdate/FixedUpdate/PostFixedUpdate` iterations as the
    /// accumulator says are due, then `PreRender -> Render -> PostRender`.
    /// Rotates event channels exactly once, at the end of the frame.
    pub fn update(&mut self, input: FrameInput) -> FrameReport {
        let mut all_failures = Vec::new();

        for phase in [Phase::PreUpdate, Phase::Update, Phase::PostUpdate] {
            let failures = self.scheduler.run_phase(phase, &mut self.world, &mut self.resources, &mut self.events);
            all_failures.push((phase, failures));
        }

        let iterations = self.accumulator.consume(input.delta_seconds);
        for _ in 0..iterations {
            for phase in Phase::FIXED {
                let failures = self.scheduler.run_phase(phase, &mut self.world, &mut self.resources, &mut self.events);
                all_failures.push((phase, failures));
            }
            self.sim_time.advance_tick();
        }

        for phase in [Phase::PreRender, Phase::Render, Phase::PostRender] {
            let failures = self.scheduler.run_phase(phase, &mut self.world, &mut self.resources, &mut self.events);
            all_failures.push((phase, failures));
        }

        self.events.update();
        self.finish_frame(all_failures)
    }

    /// Run every installed plugin's `cleanup` in registration order.
    pub fn shutdown(&mut self) {
        for installed in &mut self.plugins {
            let mut context = PluginContext { scheduler: &mut self.scheduler, resources: &mut self.resources };
            installed.plugin.cleanup(&mut context);
        }
    }

    fn finish_frame(&mut self, failures_by_phase: Vec<(Phase, Vec<(SystemHandle, anyhow::Error)>)>) -> FrameReport {
        let mut system_errors = Vec::new();
        for (phase, failures) in failures_by_phase {
            for (handle, error) in failures {
                system_errors.push((phase, handle, error));
            }
        }
        let diagnostics = self.scheduler.drain_diagnostics().into_iter().chain(self.diagnostics.drain(..)).collect();
        FrameReport { system_errors, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{SystemConfig, SystemFn};

    struct CountingPlugin {
        built: bool,
    }

    impl Plugin for CountingPlugin {
        fn name(&self) -> &'static str {
            "CountingPlugin"
        }

        fn build(&mut self, context: &mut PluginContext) {
            self.built = true;
            context.resources.insert(0u32);
            let config = SystemConfig::new("increment", Phase::Update, SystemFn::Sync(Box::new(|commands| {
                *commands.resource_mut::<u32>().unwrap() += 1;
                Ok(())
            })));
            context.scheduler.add_system(Phase::Update, config).unwrap();
        }
    }

    #[test]
    fn plugin_build_registers_resources_and_systems() {
        let mut app = App::new();
        app.add_plugin(CountingPlugin { built: false });
        app.install_plugins();

        app.update(FrameInput { delta_seconds: 0.0 });
        assert_eq!(*app.resources().get::<u32>().unwrap(), 1);
    }

    #[test]
    fn duplicate_unique_plugin_is_a_no_op() {
        let mut app = App::new();
        app.add_plugin(CountingPlugin { built: false });
        app.add_plugin(CountingPlugin { built: false });
        app.install_plugins();
        app.update(FrameInput { delta_seconds: 0.0 });
        assert_eq!(*app.resources().get::<u32>().unwrap(), 1);
    }

    #[test]
    fn fixed_update_runs_floor_delta_times_rate_iterations() {
        let mut app = App::new();
        let config = SystemConfig::new("tick", Phase::FixedUpdate, SystemFn::Sync(Box::new(|commands| {
            *commands.resource_mut::<u32>().unwrap() += 1;
            Ok(())
        })));
        app.resources_mut().insert(0u32);
        app.scheduler_mut().add_system(Phase::FixedUpdate, config).unwrap();

        app.update(FrameInput { delta_seconds: 1.0 });
        assert_eq!(*app.resources().get::<u32>().unwrap(), crate::time::TICK_RATE_HZ);
    }
}
