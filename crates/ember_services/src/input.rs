//! Input device state: the collaborator the core consumes for keyboard,
//! mouse button, pointer, and wheel state. Polling the real OS/windowing
//! layer is out of scope; this only defines the shape and the
//! per-frame pressed/just-pressed/just-released bookkeeping.

use std::collections::HashSet;

/// Recognized logical keys. Alphanumeric, arrows, space, escape, enter,
/// and the three mouse buttons - nothing beyond what the core actually
/// reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    Char(char),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Space,
    Escape,
    Enter,
    MouseLeft,
    MouseMiddle,
    MouseRight,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub position: [f32; 2],
    pub motion_delta: [f32; 2],
    pub wheel_delta: f32,
}

/// One frame's input state. `begin_frame` clears the transient
/// just-pressed/just-released/delta fields before the host feeds in new
/// raw events for the frame.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HashSet<LogicalKey>,
    just_pressed: HashSet<LogicalKey>,
    just_released: HashSet<LogicalKey>,
    pointer: PointerState,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, key: LogicalKey) -> bool {
        self.held.contains(&key)
    }

    pub fn just_pressed(&self, key: LogicalKey) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn just_released(&self, key: LogicalKey) -> bool {
        self.just_released.contains(&key)
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn press(&mut self, key: LogicalKey) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: LogicalKey) {
        if self.held.remove(&key) {
            self.just_released.insert(key);
        }
    }

    pub fn set_pointer_position(&mut self, position: [f32; 2]) {
        let delta = [position[0] - self.pointer.position[0], position[1] - self.pointer.position[1]];
        self.pointer.position = position;
        self.pointer.motion_delta[0] += delta[0];
        self.pointer.motion_delta[1] += delta[1];
    }

    pub fn add_wheel_delta(&mut self, delta: f32) {
        self.pointer.wheel_delta += delta;
    }

    /// Clear just-pressed/just-released/motion-delta accumulators; call
    /// once before the host dispatches this frame's raw input events.
    pub fn begin_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
        self.pointer.motion_delta = [0.0, 0.0];
        self.pointer.wheel_delta = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_then_release_in_one_frame_reports_both_transient_states() {
        let mut input = InputState::new();
        input.press(LogicalKey::Space);
        assert!(input.is_pressed(LogicalKey::Space));
        assert!(input.just_pressed(LogicalKey::Space));

        input.release(LogicalKey::Space);
        assert!(!input.is_pressed(LogicalKey::Space));
        assert!(input.just_released(LogicalKey::Space));
    }

    #[test]
    fn begin_frame_clears_transient_flags_but_not_held_state() {
        let mut input = InputState::new();
        input.press(LogicalKey::ArrowUp);
        input.begin_frame();
        assert!(input.is_pressed(LogicalKey::ArrowUp));
        assert!(!input.just_pressed(LogicalKey::ArrowUp));
    }

    #[test]
    fn pointer_motion_delta_accumulates_within_a_frame() {
        let mut input = InputState::new();
        input.set_pointer_position([10.0, 10.0]);
        input.begin_frame();
        input.set_pointer_position([12.0, 11.0]);
        input.set_pointer_position([14.0, 9.0]);
        assert_eq!(input.pointer().motion_delta, [4.0, -1.0]);
    }
}
