//! Deterministic time system
//!
//! Fixed 60Hz tick rate with an accumulator that turns a variable real
//! frame delta into zero or more fixed-size simulation steps, so gameplay
//! logic never depends on frame rate.

use std::time::Duration;

/// Fixed simulation tick rate (60 Hz = 16.666ms per tick)
pub const TICK_RATE_HZ: u32 = 60;
pub const TICK_DURATION: Duration = Duration::from_micros(16_666); // ~16.666ms
pub const FIXED_STEP_SECONDS: f64 = 1.0 / TICK_RATE_HZ as f64;

/// Simulation time tracker, advanced once per fixed-update iteration (not
/// once per frame).
pub struct SimulationTime {
    tick_count: u64,
    accumulated_time: Duration,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self { tick_count: 0, accumulated_time: Duration::ZERO }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn advance_tick(&mut self) {
        self.tick_count += 1;
        self.accumulated_time += TICK_DURATION;
    }

    pub fn total_time(&self) -> Duration {
        self.accumulated_time
    }
}

impl Default for SimulationTime {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a variable real-time delta into a whole number of fixed
/// 1/60s steps. Leftover time below one step carries over to the next
/// call, so the App's main loop never drifts.
///
/// With a very long real delta `Δ`, `consume` produces `⌊Δ·60⌋` iterations;
/// every iteration's own `Δt` is exactly `FIXED_STEP_SECONDS`.
#[derive(Debug, Default)]
pub struct FixedStepAccumulator {
    remainder: f64,
}

impl FixedStepAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta_seconds` of real time and return how many fixed steps
    /// are now due. Each due step should run with a `Δt` of
    /// [`FIXED_STEP_SECONDS`]; this call consumes exactly
    /// `iterations * FIXED_STEP_SECONDS` from the accumulator, retaining
    /// the rest.
    pub fn consume(&mut self, delta_seconds: f64) -> u32 {
        self.remainder += delta_seconds;
        let iterations = (self.remainder / FIXED_STEP_SECONDS).floor().max(0.0);
        self.remainder -= iterations * FIXED_STEP_SECONDS;
        iterations as u32
    }

    pub fn remainder_seconds(&self) -> f64 {
        self.remainder
    }

    /// Fraction of the way into the next fixed step, for render-time
    /// interpolation between the previous and current simulation state.
    pub fn interpolation_alpha(&self) -> f64 {
        self.remainder / FIXED_STEP_SECONDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_frame_at_exact_step_yields_one_iteration() {
        let mut accumulator = FixedStepAccumulator::new();
        assert_eq!(accumulator.consume(FIXED_STEP_SECONDS), 1);
        assert!(accumulator.remainder_seconds().abs() < 1e-9);
    }

    #[test]
    fn long_delta_yields_floor_of_delta_times_rate() {
        let mut accumulator = FixedStepAccumulator::new();
        let delta = 1.0; // one full second
        let iterations = accumulator.consume(delta);
        assert_eq!(iterations, (delta * TICK_RATE_HZ as f64).floor() as u32);
    }

    #[test]
    fn remainder_carries_over_between_calls() {
        let mut accumulator = FixedStepAccumulator::new();
        let half_step = FIXED_STEP_SECONDS / 2.0;
        assert_eq!(accumulator.consume(half_step), 0);
        assert_eq!(accumulator.consume(half_step), 1);
    }

    #[test]
    fn sub_step_delta_produces_no_iterations() {
        let mut accumulator = FixedStepAccumulator::new();
        assert_eq!(accumulator.consume(FIXED_STEP_SECONDS * 0.1), 0);
    }
}
