//! Minimal binary that links the engine crates and drives an `App`
//! through startup and a handful of frames with no renderer attached -
//! see `examples/` for a windowed run.

use anyhow::Result;
use ember_core::app::{App, FrameInput};
use ember_core::time::FIXED_STEP_SECONDS;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("Ember Engine v{}", ember_core::VERSION);

    let mut app = App::new();
    app.install_plugins();

    let report = app.startup();
    for (phase, handle, error) in &report.system_errors {
        tracing::error!(?phase, ?handle, %error, "system failed during startup");
    }

    for frame in 0..180 {
        let report = app.update(FrameInput { delta_seconds: FIXED_STEP_SECONDS });
        for (phase, handle, error) in &report.system_errors {
            tracing::error!(?phase, ?handle, %error, frame, "system failed");
        }
        for diagnostic in &report.diagnostics {
            tracing::warn!(%diagnostic, frame, "scheduler diagnostic");
        }
    }

    app.shutdown();
    Ok(())
}
