// phase.rs - the fixed sequence of scheduling phases run every App update.
//
// The three `*FixedUpdate` phases run zero or more times per frame, driven
// by the App's accumulator (see `ember_core::time`): each iteration
// advances simulation time by exactly 1/60s, so gameplay logic stays
// deterministic regardless of frame rate.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Startup,
    PreUpdate,
    Update,
    PostUpdate,
    PreFixedUpdate,
    FixedUpdate,
    PostFixedUpdate,
    PreRender,
    Render,
    PostRender,
}

impl Phase {
    pub const ALL: [Phase; 10] = [
        Phase::Startup,
        Phase::PreUpdate,
        Phase::Update,
        Phase::PostUpdate,
        Phase::PreFixedUpdate,
        Phase::FixedUpdate,
        Phase::PostFixedUpdate,
        Phase::PreRender,
        Phase::Render,
        Phase::PostRender,
    ];

    /// Phases driven by the fixed-step accumulator, run zero or more times
    /// per frame rather than exactly once.
    pub const FIXED: [Phase; 3] = [Phase::PreFixedUpdate, Phase::FixedUpdate, Phase::PostFixedUpdate];

    pub fn is_fixed(self) -> bool {
        matches!(self, Phase::PreFixedUpdate | Phase::FixedUpdate | Phase::PostFixedUpdate)
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Startup => "Startup",
            Phase::PreUpdate => "PreUpdate",
            Phase::Update => "Update",
            Phase::PostUpdate => "PostUpdate",
            Phase::PreFixedUpdate => "PreFixedUpdate",
            Phase::FixedUpdate => "FixedUpdate",
            Phase::PostFixedUpdate => "PostFixedUpdate",
            Phase::PreRender => "PreRender",
            Phase::Render => "Render",
            Phase::PostRender => "PostRender",
        }
    }
}
