// system.rs - a registered system: its callable plus its scheduling metadata.

use crate::ecs::Commands;
use crate::scheduler::dependency::{Constraint, DependencyTarget};
use crate::scheduler::run_condition::RunCondition;
use crate::scheduler::{Phase, SetId, SystemHandle};
use std::future::Future;
use std::pin::Pin;

/// Result type every system (sync or async) returns. An error terminates
/// only that system's invocation for this tick; the rest of the phase
/// still runs, and the error is surfaced to the App.
pub type SystemResult = anyhow::Result<()>;

/// Hand-implemented by systems that need to `.await` something (another
/// plugin's async API, an async asset probe) before the scheduler moves
/// on to the next system. There is no task pool behind this: `call`'s
/// future is driven to completion with a blocking poll loop before the
/// next system in topological order starts, so "async" here means
/// "may suspend on one `.await` point", not "runs concurrently".
pub trait AsyncSystem: Send {
    fn call<'a>(&'a mut self, commands: &'a mut Commands<'a>) -> Pin<Box<dyn Future<Output = SystemResult> + 'a>>;
}

pub enum SystemFn {
    Sync(Box<dyn FnMut(&mut Commands) -> SystemResult + Send>),
    Async(Box<dyn AsyncSystem>),
}

/// A registered system plus everything the scheduler needs to order and
/// gate it: the phase it belongs to, its set/label memberships, its direct
/// before/after constraints, and its run-if predicates.
pub struct SystemConfig {
    name: &'static str,
    phase: Phase,
    sets: Vec<SetId>,
    labels: Vec<&'static str>,
    constraints: Vec<Constraint>,
    run_if: Vec<RunCondition>,
    func: SystemFn,
    handle: Option<SystemHandle>,
}

impl SystemConfig {
    pub fn new(name: &'static str, phase: Phase, func: SystemFn) -> Self {
        Self { name, phase, sets: Vec::new(), labels: Vec::new(), constraints: Vec::new(), run_if: Vec::new(), func, handle: None }
    }

    pub fn in_set(mut self, set: SetId) -> Self {
        if !self.sets.contains(&set) {
            self.sets.push(set);
        }
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    pub fn before(mut self, system: &'static str) -> Self {
        self.constraints.push(Constraint::Before(DependencyTarget::System(system)));
        self
    }

    pub fn after(mut self, system: &'static str) -> Self {
        self.constraints.push(Constraint::After(DependencyTarget::System(system)));
        self
    }

    pub fn before_set(mut self, set: SetId) -> Self {
        self.constraints.push(Constraint::Before(DependencyTarget::Set(set)));
        self
    }

    pub fn after_set(mut self, set: SetId) -> Self {
        self.constraints.push(Constraint::After(DependencyTarget::Set(set)));
        self
    }

    pub fn before_label(mut self, label: &'static str) -> Self {
        self.constraints.push(Constraint::Before(DependencyTarget::Label(label)));
        self
    }

    pub fn after_label(mut self, label: &'static str) -> Self {
        self.constraints.push(Constraint::After(DependencyTarget::Label(label)));
        self
    }

    pub fn run_if(mut self, condition: RunCondition) -> Self {
        self.run_if.push(condition);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sets(&self) -> &[SetId] {
        &self.sets
    }

    pub fn labels(&self) -> &[&'static str] {
        &self.labels
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn run_conditions(&self) -> &[RunCondition] {
        &self.run_if
    }

    pub fn handle(&self) -> Option<SystemHandle> {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: SystemHandle) {
        self.handle = Some(handle);
    }

    pub(crate) fn func_mut(&mut self) -> &mut SystemFn {
        &mut self.func
    }
}
