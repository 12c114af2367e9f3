// events.rs - double-buffered, per-type event channels
//
// Each event type gets its own channel with two buffers: events sent this
// frame land in the "current" buffer; `update()` (called once per frame by
// the scheduler) rotates current -> previous and starts a fresh current.
// A reader therefore sees an event for exactly two rotations after it was
// sent - the frame it was sent, and the following frame - then it's gone.
// Readers are per-consumer cursors (a system's own `EventReader<T>`), so
// two systems reading the same event type don't interfere with each
// other's progress.

use std::any::{Any, TypeId};
use std::collections::HashMap;

pub type EventId = u64;

struct Channel<T> {
    previous: Vec<(EventId, T)>,
    current: Vec<(EventId, T)>,
    next_id: EventId,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self { previous: Vec::new(), current: Vec::new(), next_id: 0 }
    }
}

trait AnyChannel: Any + Send + Sync {
    fn rotate(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + Sync + 'static> AnyChannel for Channel<T> {
    fn rotate(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registry of per-type event channels. Owned by the App/World and rotated
/// once per frame.
#[derive(Default)]
pub struct Events {
    channels: HashMap<TypeId, Box<dyn AnyChannel>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel<T: Send + Sync + 'static>(&mut self) -> &mut Channel<T> {
        self.channels
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Channel::<T>::default()))
            .as_any_mut()
            .downcast_mut::<Channel<T>>()
            .expect("event channel type mismatch")
    }

    pub fn send<T: Send + Sync + 'static>(&mut self, event: T) {
        let channel = self.channel::<T>();
        let id = channel.next_id;
        channel.next_id += 1;
        channel.current.push((id, event));
    }

    /// Rotate every registered channel. Call once per frame after all
    /// systems have run.
    pub fn update(&mut self) {
        for channel in self.channels.values_mut() {
            channel.rotate();
        }
    }

    /// Fresh cursor for reading events of type `T`, starting from "now"
    /// (it will not see events already rotated out before this call).
    pub fn reader<T: Send + Sync + 'static>(&self) -> EventReader<T> {
        EventReader { last_seen: 0, _marker: std::marker::PhantomData }
    }

    pub fn read<'a, T: Send + Sync + 'static>(&'a self, reader: &mut EventReader<T>) -> Vec<&'a T> {
        let Some(boxed) = self.channels.get(&TypeId::of::<T>()) else { return Vec::new() };
        let channel = boxed.as_any().downcast_ref::<Channel<T>>().expect("event channel type mismatch");

        let mut out = Vec::new();
        for (id, event) in channel.previous.iter().chain(channel.current.iter()) {
            if *id >= reader.last_seen {
                out.push(event);
            }
        }
        if let Some((last_id, _)) = channel.current.last().or_else(|| channel.previous.last()) {
            reader.last_seen = last_id + 1;
        }
        out
    }
}

/// Per-consumer read cursor into an [`Events`] channel. Each owner (a
/// system, a plugin) should keep its own `EventReader<T>` rather than
/// sharing one, so independent readers don't race each other's progress.
pub struct EventReader<T> {
    last_seen: EventId,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for EventReader<T> {
    fn default() -> Self {
        Self { last_seen: 0, _marker: std::marker::PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Damage(u32);

    #[test]
    fn reader_sees_events_for_two_rotations() {
        let mut events = Events::new();
        let mut reader = events.reader::<Damage>();

        events.send(Damage(10));
        assert_eq!(events.read(&mut reader), vec![&Damage(10)]);

        events.update(); // rotate: event moves to "previous"
        assert_eq!(events.read(&mut reader).len(), 0); // already consumed

        events.update(); // rotate again: event is gone
        assert_eq!(events.channels.len(), 1);
    }

    #[test]
    fn fresh_event_after_rotation_is_still_visible() {
        let mut events = Events::new();
        events.send(Damage(1));
        events.update();
        let mut reader = events.reader::<Damage>();
        // reader created after the rotation still sees it once (in `previous`).
        assert_eq!(events.read(&mut reader), vec![&Damage(1)]);
        events.update();
        assert_eq!(events.read(&mut reader).len(), 0);
    }

    #[test]
    fn independent_readers_track_separate_cursors() {
        let mut events = Events::new();
        events.send(Damage(5));
        let mut reader_a = events.reader::<Damage>();
        let mut reader_b = events.reader::<Damage>();
        assert_eq!(events.read(&mut reader_a).len(), 1);
        assert_eq!(events.read(&mut reader_b).len(), 1);
    }
}
