// schedule.rs - one phase's systems, their ordering graph, and their run-gates.

use crate::ecs::{Commands, Events, Resources, World};
use crate::scheduler::dependency::{Constraint, DependencyTarget};
use crate::scheduler::diagnostics::SchedulerDiagnostic;
use crate::scheduler::graph::topo_sort;
use crate::scheduler::run_condition::RunGateContext;
use crate::scheduler::set::SetConfig;
use crate::scheduler::system::{SystemConfig, SystemFn, SystemResult};
use crate::scheduler::{Phase, SetId, SystemHandle, SystemRegistrationError};
use std::collections::HashMap;

pub(crate) struct PhaseSchedule {
    phase: Phase,
    systems: Vec<SystemConfig>,
    name_lookup: HashMap<&'static str, usize>,
    local_sets: HashMap<SetId, SetConfig>,
    order: Option<Vec<usize>>,
}

impl PhaseSchedule {
    pub fn new(phase: Phase) -> Self {
        Self { phase, systems: Vec::new(), name_lookup: HashMap::new(), local_sets: HashMap::new(), order: None }
    }

    pub fn add_system(&mut self, mut config: SystemConfig, next_handle: &mut u32) -> Result<SystemHandle, SystemRegistrationError> {
        if self.name_lookup.contains_key(config.name()) {
            return Err(SystemRegistrationError::DuplicateName { name: config.name().to_string() });
        }
        let handle = SystemHandle::new(*next_handle);
        *next_handle += 1;
        config.set_handle(handle);
        self.name_lookup.insert(config.name(), self.systems.len());
        self.systems.push(config);
        self.order = None;
        Ok(handle)
    }

    pub fn configure_set(&mut self, id: SetId, config: SetConfig) {
        self.local_sets.insert(id, config);
        self.order = None;
    }

    pub fn invalidate_order(&mut self) {
        self.order = None;
    }

    fn members_of_set(&self, set: SetId) -> Vec<usize> {
        self.systems.iter().enumerate().filter(|(_, s)| s.sets().contains(&set)).map(|(i, _)| i).collect()
    }

    fn members_with_label(&self, label: &str) -> Vec<usize> {
        self.systems.iter().enumerate().filter(|(_, s)| s.labels().contains(&label)).map(|(i, _)| i).collect()
    }

    fn resolve_target(&self, target: &DependencyTarget) -> Vec<usize> {
        match target {
            DependencyTarget::System(name) => self.name_lookup.get(name).copied().into_iter().collect(),
            DependencyTarget::Set(set) => self.members_of_set(*set),
            DependencyTarget::Label(label) => self.members_with_label(label),
        }
    }

    fn resolve_edges(&self, global_sets: &HashMap<SetId, SetConfig>) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();

        // Tiers 1, 2, 4: direct system-level before/after, whatever kind of
        // target they name (plain system, set, or label all resolve through
        // `resolve_target`).
        for (i, system) in self.systems.iter().enumerate() {
            for constraint in system.constraints() {
                match constraint {
                    Constraint::Before(target) => {
                        for j in self.resolve_target(target) {
                            edges.push((i, j));
                        }
                    }
                    Constraint::After(target) => {
                        for j in self.resolve_target(target) {
                            edges.push((j, i));
                        }
                    }
                }
            }
        }

        // Tier 3: per-set constraints, applied to every current member of
        // the set, both phase-local and global/wildcard.
        let mut set_ids: Vec<SetId> = self.systems.iter().flat_map(|s| s.sets().iter().copied()).collect();
        set_ids.sort_by_key(|s| s.0);
        set_ids.dedup();

        for set in set_ids {
            let members = self.members_of_set(set);
            for config in [self.local_sets.get(&set), global_sets.get(&set)].into_iter().flatten() {
                for constraint in config.constraints() {
                    match constraint {
                        Constraint::Before(target) => {
                            for &m in &members {
                                for j in self.resolve_target(target) {
                                    edges.push((m, j));
                                }
                            }
                        }
                        Constraint::After(target) => {
                            for &m in &members {
                                for j in self.resolve_target(target) {
                                    edges.push((j, m));
                                }
                            }
                        }
                    }
                }
            }
        }

        edges
    }

    fn ensure_order(&mut self, global_sets: &HashMap<SetId, SetConfig>, diagnostics: &mut Vec<SchedulerDiagnostic>) {
        if self.order.is_some() {
            return;
        }
        let edges = self.resolve_edges(global_sets);
        let order = match topo_sort(self.systems.len(), &edges) {
            Ok(order) => order,
            Err(()) => {
                diagnostics.push(SchedulerDiagnostic::SchedulerCycle { phase: self.phase });
                (0..self.systems.len()).collect()
            }
        };
        self.order = Some(order);
    }

    fn gate_open(&self, index: usize, world: &World, resources: &Resources, events: &Events, global_sets: &HashMap<SetId, SetConfig>) -> bool {
        let context = RunGateContext::new(world, resources, events);
        let system = &self.systems[index];
        if !system.run_conditions().iter().all(|cond| cond(&context)) {
            return false;
        }
        for set in system.sets() {
            for config in [self.local_sets.get(set), global_sets.get(set)].into_iter().flatten() {
                if !config.run_conditions().iter().all(|cond| cond(&context)) {
                    return false;
                }
            }
        }
        true
    }

    /// Run every system in this phase in topological order, skipping any
    /// whose run-gate is closed. Returns the (system, error) pairs for
    /// systems that returned `Err` this tick; the rest of the phase still
    /// ran.
    pub fn run(
        &mut self,
        world: &mut World,
        resources: &mut Resources,
        events: &mut Events,
        global_sets: &HashMap<SetId, SetConfig>,
        diagnostics: &mut Vec<SchedulerDiagnostic>,
    ) -> Vec<(SystemHandle, anyhow::Error)> {
        self.ensure_order(global_sets, diagnostics);
        let order = self.order.clone().unwrap_or_default();
        let mut failures = Vec::new();

        for index in order {
            if !self.gate_open(index, world, resources, events, global_sets) {
                continue;
            }
            let handle = self.systems[index].handle().expect("system registered without a handle");
            let result: SystemResult = {
                let mut commands = Commands::new(world, resources, events);
                match self.systems[index].func_mut() {
                    SystemFn::Sync(func) => func(&mut commands),
                    SystemFn::Async(system) => pollster::block_on(system.call(&mut commands)),
                }
            };
            if let Err(error) = result {
                tracing::error!(system = self.systems[index].name(), phase = ?self.phase, %error, "system returned an error");
                failures.push((handle, error));
            }
        }

        failures
    }

    pub fn systems(&self) -> &[SystemConfig] {
        &self.systems
    }
}
