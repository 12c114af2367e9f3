// diagnostics.rs - non-fatal conditions the scheduler/app log rather than panic on.

use crate::scheduler::Phase;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerDiagnostic {
    #[error("phase {phase:?} has a cyclic ordering constraint; falling back to insertion order")]
    SchedulerCycle { phase: Phase },

    #[error("plugin '{plugin}' did not become ready within the cap; skipped")]
    PluginNotReady { plugin: String },
}
