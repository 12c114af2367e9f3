// set.rs - opaque tags naming a group of systems.
//
// Sets carry their own before/after constraints (against other sets,
// labels, or plain names) and their own run-if predicates; both apply
// transitively to every system currently in the set.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(pub &'static str);

impl From<&'static str> for SetId {
    fn from(name: &'static str) -> Self {
        SetId(name)
    }
}

use crate::scheduler::dependency::{Constraint, DependencyTarget};
use crate::scheduler::run_condition::RunCondition;

/// Constraints and run-if predicates declared against a set as a whole.
/// Registered either against one phase (`Scheduler::configure_set`) or
/// against every phase the set appears in (`Scheduler::configure_set_global`,
/// spec's "wildcard table").
#[derive(Default)]
pub struct SetConfig {
    constraints: Vec<Constraint>,
    run_if: Vec<RunCondition>,
}

impl SetConfig {
    pub fn new() -> Self {
        Self::default()
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

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn run_conditions(&self) -> &[RunCondition] {
        &self.run_if
    }
}
