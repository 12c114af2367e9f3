// dependency.rs - the targets a before/after constraint can name.
//
// A constraint can point at a single system by name, every current member
// of a set, or every system carrying a label. Set- and label-level edges
// are expanded against the phase's system list when the ordering graph is
// built (see graph.rs); they are not resolved at the point the constraint
// is declared, since membership can still change until registration
// closes.

use crate::scheduler::SetId;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DependencyTarget {
    System(&'static str),
    Set(SetId),
    Label(&'static str),
}

/// One before/after constraint attached to a system or a set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constraint {
    Before(DependencyTarget),
    After(DependencyTarget),
}
