// scheduler - orders, gates, and dispatches systems across lifecycle phases.
//
// One `PhaseSchedule` per `Phase`, each with its own ordering graph built
// from before/after constraints at the system, set, and label level (see
// `schedule.rs` for the precedence rules). Execution is single-threaded
// and cooperative: there is no work-stealing pool here, matching the
// engine's "multi-threaded parallel system execution is a non-goal"
// stance - ordering exists to make results deterministic, not to extract
// parallelism.

mod dependency;
mod diagnostics;
mod graph;
mod phase;
mod run_condition;
mod schedule;
mod set;
mod system;
mod system_handle;
mod system_registration_error;

pub use dependency::{Constraint, DependencyTarget};
pub use diagnostics::SchedulerDiagnostic;
pub use phase::Phase;
pub use run_condition::{RunCondition, RunGateContext};
pub use set::{SetConfig, SetId};
pub use system::{AsyncSystem, SystemConfig, SystemFn, SystemResult};
pub use system_handle::SystemHandle;
pub use system_registration_error::SystemRegistrationError;

use crate::ecs::{Events, Resources, World};
use schedule::PhaseSchedule;
use std::collections::HashMap;

/// Owns every phase's schedule, the global ("wildcard") set configuration
/// table, and the running list of non-fatal diagnostics
/// (`SchedulerCycle`, surfaced plugin issues are logged by the App instead).
pub struct Scheduler {
    phases: HashMap<Phase, PhaseSchedule>,
    global_sets: HashMap<SetId, SetConfig>,
    diagnostics: Vec<SchedulerDiagnostic>,
    next_handle: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        let phases = Phase::ALL.into_iter().map(|phase| (phase, PhaseSchedule::new(phase))).collect();
        Self { phases, global_sets: HashMap::new(), diagnostics: Vec::new(), next_handle: 0 }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system(&mut self, phase: Phase, config: SystemConfig) -> Result<SystemHandle, SystemRegistrationError> {
        let schedule = self.phases.entry(phase).or_insert_with(|| PhaseSchedule::new(phase));
        schedule.add_system(config, &mut self.next_handle)
    }

    /// Configure a set's constraints/run-gates for one specific phase.
    pub fn configure_set(&mut self, phase: Phase, id: SetId, config: SetConfig) {
        let schedule = self.phases.entry(phase).or_insert_with(|| PhaseSchedule::new(phase));
        schedule.configure_set(id, config);
    }

    /// Configure a set's constraints/run-gates across every phase it
    /// appears in (the "wildcard table" alongside each phase's own table).
    pub fn configure_set_global(&mut self, id: SetId, config: SetConfig) {
        self.global_sets.insert(id, config);
        for schedule in self.phases.values_mut() {
            schedule.invalidate_order();
        }
    }

    pub fn run_phase(&mut self, phase: Phase, world: &mut World, resources: &mut Resources, events: &mut Events) -> Vec<(SystemHandle, anyhow::Error)> {
        let Some(schedule) = self.phases.get_mut(&phase) else { return Vec::new() };
        schedule.run(world, resources, events, &self.global_sets, &mut self.diagnostics)
    }

    pub fn drain_diagnostics(&mut self) -> Vec<SchedulerDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn systems_in_phase(&self, phase: Phase) -> &[SystemConfig] {
        self.phases.get(&phase).map(|s| s.systems()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Events, Resources, World};

    fn system(name: &'static str) -> SystemConfig {
        SystemConfig::new(name, Phase::Update, SystemFn::Sync(Box::new(|_commands| Ok(()))))
    }

    #[test]
    fn systems_run_in_insertion_order_with_no_constraints() {
        let mut scheduler = Scheduler::new();
        let mut world = World::new();
        let mut resources = Resources::new();
        let mut events = Events::new();
        resources.insert::<Vec<&'static str>>(Vec::new());

        for name in ["a", "b", "c"] {
            let order_log_name = name;
            let config = SystemConfig::new(name, Phase::Update, SystemFn::Sync(Box::new(move |commands| {
                commands.resource_mut::<Vec<&'static str>>().unwrap().push(order_log_name);
                Ok(())
            })));
            scheduler.add_system(Phase::Update, config).unwrap();
        }

        scheduler.run_phase(Phase::Update, &mut world, &mut resources, &mut events);
        assert_eq!(resources.get::<Vec<&'static str>>().unwrap(), &vec!["a", "b", "c"]);
    }

    #[test]
    fn after_constraint_reorders_execution() {
        let mut scheduler = Scheduler::new();
        let mut world = World::new();
        let mut resources = Resources::new();
        let mut events = Events::new();
        resources.insert::<Vec<&'static str>>(Vec::new());

        let log = |name: &'static str| {
            SystemConfig::new(name, Phase::Update, SystemFn::Sync(Box::new(move |commands| {
                commands.resource_mut::<Vec<&'static str>>().unwrap().push(name);
                Ok(())
            })))
        };

        scheduler.add_system(Phase::Update, log("first").after("second")).unwrap();
        scheduler.add_system(Phase::Update, log("second")).unwrap();

        scheduler.run_phase(Phase::Update, &mut world, &mut resources, &mut events);
        assert_eq!(resources.get::<Vec<&'static str>>().unwrap(), &vec!["second", "first"]);
    }

    #[test]
    fn duplicate_system_name_is_rejected() {
        let mut scheduler = Scheduler::new();
        scheduler.add_system(Phase::Update, system("dup")).unwrap();
        let err = scheduler.add_system(Phase::Update, system("dup")).unwrap_err();
        assert!(matches!(err, SystemRegistrationError::DuplicateName { .. }));
    }

    #[test]
    fn cyclic_constraint_falls_back_to_insertion_order_and_diagnoses() {
        let mut scheduler = Scheduler::new();
        let mut world = World::new();
        let mut resources = Resources::new();
        let mut events = Events::new();

        scheduler.add_system(Phase::Update, system("a").after("b")).unwrap();
        scheduler.add_system(Phase::Update, system("b").after("a")).unwrap();

        scheduler.run_phase(Phase::Update, &mut world, &mut resources, &mut events);
        let diagnostics = scheduler.drain_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0], SchedulerDiagnostic::SchedulerCycle { phase: Phase::Update }));
    }

    #[test]
    fn false_run_gate_skips_every_gated_system_until_flipped() {
        let mut scheduler = Scheduler::new();
        let mut world = World::new();
        let mut resources = Resources::new();
        let mut events = Events::new();
        resources.insert(true);
        resources.insert::<Vec<&'static str>>(Vec::new());

        let gated = |name: &'static str| {
            SystemConfig::new(name, Phase::Update, SystemFn::Sync(Box::new(move |commands| {
                commands.resource_mut::<Vec<&'static str>>().unwrap().push(name);
                Ok(())
            })))
            .in_set(SetId("gated"))
        };

        scheduler.add_system(Phase::Update, gated("s1")).unwrap();
        scheduler.add_system(Phase::Update, gated("s2").after("s1")).unwrap();
        scheduler.add_system(Phase::Update, gated("s3").after("s2")).unwrap();
        scheduler.configure_set(Phase::Update, SetId("gated"), SetConfig::new().run_if(Box::new(|ctx| *ctx.resource::<bool>().unwrap())));

        *resources.get_mut::<bool>().unwrap() = false;
        scheduler.run_phase(Phase::Update, &mut world, &mut resources, &mut events);
        assert!(resources.get::<Vec<&'static str>>().unwrap().is_empty());

        *resources.get_mut::<bool>().unwrap() = true;
        scheduler.run_phase(Phase::Update, &mut world, &mut resources, &mut events);
        assert_eq!(resources.get::<Vec<&'static str>>().unwrap(), &vec!["s1", "s2", "s3"]);
    }
}
