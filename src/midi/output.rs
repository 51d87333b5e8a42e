// MIDI Output - Note/CC output collaborator used by the sequencer lines
// Fixed-size note pool with generation checked handles over a pluggable sink

use std::collections::VecDeque;

use midir::MidiOutputConnection;

use super::event::MidiEvent;

/// Handle to a sounding note
///
/// Handles are generation checked: stopping a note twice, or stopping with a
/// handle whose slot was reused, is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteHandle {
    slot: u32,
    generation: u32,
}

/// Note and control change output consumed by the lines
pub trait NoteOutput {
    /// Start a note; `None` when the note pool is exhausted
    fn play_note(
        &mut self,
        device: u8,
        channel: u8,
        note: u8,
        velocity: u8,
        timestamp: u64,
    ) -> Option<NoteHandle>;

    fn stop_note(&mut self, handle: NoteHandle, timestamp: u64);

    fn set_control_change(&mut self, device: u8, channel: u8, cc: u8, value: u8, timestamp: u64);

    /// Stop every sounding note
    fn stop_all(&mut self, timestamp: u64);
}

/// Destination for encoded MIDI events
pub trait MidiSink {
    fn send(&mut self, device: u8, event: MidiEvent, timestamp: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveNote {
    device: u8,
    channel: u8,
    note: u8,
}

#[derive(Debug, Clone)]
struct NoteSlot {
    generation: u32,
    note: Option<ActiveNote>,
}

/// Slot arena of sounding notes
///
/// Free slots are reused oldest-released first.
#[derive(Debug, Clone)]
pub struct NotePool {
    slots: Vec<NoteSlot>,
    free: VecDeque<u32>,
}

impl NotePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![
                NoteSlot {
                    generation: 0,
                    note: None,
                };
                capacity
            ],
            free: (0..capacity as u32).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of sounding notes
    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn allocate(&mut self, note: ActiveNote) -> Option<NoteHandle> {
        let slot = self.free.pop_front()?;
        let entry = &mut self.slots[slot as usize];
        entry.note = Some(note);
        Some(NoteHandle {
            slot,
            generation: entry.generation,
        })
    }

    fn release(&mut self, handle: NoteHandle) -> Option<ActiveNote> {
        let entry = self.slots.get_mut(handle.slot as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        let note = entry.note.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push_back(handle.slot);
        Some(note)
    }

    fn active_handles(&self) -> Vec<NoteHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.note.is_some())
            .map(|(i, s)| NoteHandle {
                slot: i as u32,
                generation: s.generation,
            })
            .collect()
    }
}

/// `NoteOutput` implementation backed by a note pool and a sink
pub struct PooledOutput<S: MidiSink> {
    sink: S,
    pool: NotePool,
}

impl<S: MidiSink> PooledOutput<S> {
    pub fn new(sink: S, pool_size: usize) -> Self {
        Self {
            sink,
            pool: NotePool::new(pool_size),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn pool(&self) -> &NotePool {
        &self.pool
    }
}

impl<S: MidiSink> NoteOutput for PooledOutput<S> {
    fn play_note(
        &mut self,
        device: u8,
        channel: u8,
        note: u8,
        velocity: u8,
        timestamp: u64,
    ) -> Option<NoteHandle> {
        let Some(handle) = self.pool.allocate(ActiveNote {
            device,
            channel,
            note,
        }) else {
            log::debug!("Note pool exhausted, dropping note {} on device {}", note, device);
            return None;
        };

        self.sink.send(
            device,
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            },
            timestamp,
        );
        Some(handle)
    }

    fn stop_note(&mut self, handle: NoteHandle, timestamp: u64) {
        if let Some(active) = self.pool.release(handle) {
            self.sink.send(
                active.device,
                MidiEvent::NoteOff {
                    channel: active.channel,
                    note: active.note,
                },
                timestamp,
            );
        }
    }

    fn set_control_change(&mut self, device: u8, channel: u8, cc: u8, value: u8, timestamp: u64) {
        self.sink.send(
            device,
            MidiEvent::ControlChange {
                channel,
                controller: cc,
                value,
            },
            timestamp,
        );
    }

    fn stop_all(&mut self, timestamp: u64) {
        for handle in self.pool.active_handles() {
            self.stop_note(handle, timestamp);
        }
    }
}

/// Sink writing to midir output ports, indexed by device id
///
/// A `None` entry keeps device ids stable when a port failed to open.
/// midir sends immediately; timestamps only order events logically.
pub struct MidirSink {
    connections: Vec<Option<MidiOutputConnection>>,
}

impl MidirSink {
    pub fn new(connections: Vec<Option<MidiOutputConnection>>) -> Self {
        Self { connections }
    }

    pub fn device_count(&self) -> usize {
        self.connections.len()
    }
}

impl MidiSink for MidirSink {
    fn send(&mut self, device: u8, event: MidiEvent, _timestamp: u64) {
        // Devices without an opened port are dropped
        let Some(Some(connection)) = self.connections.get_mut(device as usize) else {
            return;
        };
        if let Err(e) = connection.send(&event.to_bytes()) {
            log::warn!("MIDI send failed on device {}: {}", device, e);
        }
    }
}

/// Message captured by `RecordingSink`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMessage {
    NoteOn {
        device: u8,
        channel: u8,
        note: u8,
        velocity: u8,
        timestamp: u64,
    },
    NoteOff {
        device: u8,
        channel: u8,
        note: u8,
        timestamp: u64,
    },
    ControlChange {
        device: u8,
        channel: u8,
        cc: u8,
        value: u8,
        timestamp: u64,
    },
}

/// Sink that records everything it is sent (tests and dry runs)
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Vec<OutputMessage>,
}

impl RecordingSink {
    pub fn messages(&self) -> &[OutputMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl MidiSink for RecordingSink {
    fn send(&mut self, device: u8, event: MidiEvent, timestamp: u64) {
        let message = match event {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => OutputMessage::NoteOn {
                device,
                channel,
                note,
                velocity,
                timestamp,
            },
            MidiEvent::NoteOff { channel, note } => OutputMessage::NoteOff {
                device,
                channel,
                note,
                timestamp,
            },
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => OutputMessage::ControlChange {
                device,
                channel,
                cc: controller,
                value,
                timestamp,
            },
        };
        self.messages.push(message);
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MidiSink for NullSink {
    fn send(&mut self, _device: u8, _event: MidiEvent, _timestamp: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(size: usize) -> PooledOutput<RecordingSink> {
        PooledOutput::new(RecordingSink::default(), size)
    }

    #[test]
    fn test_play_and_stop() {
        let mut out = output(4);
        let handle = out.play_note(1, 2, 60, 100, 5).unwrap();
        assert_eq!(out.pool().active_count(), 1);
        out.stop_note(handle, 6);
        assert_eq!(out.pool().active_count(), 0);

        assert_eq!(
            out.sink().messages(),
            &[
                OutputMessage::NoteOn { device: 1, channel: 2, note: 60, velocity: 100, timestamp: 5 },
                OutputMessage::NoteOff { device: 1, channel: 2, note: 60, timestamp: 6 },
            ]
        );
    }

    #[test]
    fn test_exhausted_pool_drops_notes() {
        let mut out = output(2);
        assert!(out.play_note(0, 0, 60, 1, 0).is_some());
        assert!(out.play_note(0, 0, 61, 1, 0).is_some());
        assert!(out.play_note(0, 0, 62, 1, 0).is_none());
        assert_eq!(out.sink().messages().len(), 2);
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let mut out = output(1);
        let first = out.play_note(0, 0, 60, 1, 0).unwrap();
        out.stop_note(first, 1);
        let second = out.play_note(0, 0, 70, 1, 2).unwrap();
        assert_ne!(first, second);

        // Double stop of the old handle must not silence the new note
        out.stop_note(first, 3);
        assert_eq!(out.pool().active_count(), 1);
    }

    #[test]
    fn test_free_slots_reused_oldest_first() {
        let mut pool = NotePool::new(3);
        let note = ActiveNote { device: 0, channel: 0, note: 1 };
        let a = pool.allocate(note).unwrap();
        let b = pool.allocate(note).unwrap();
        pool.release(b);
        pool.release(a);

        // Slot 2 was never used and is still the oldest free slot
        assert_eq!(pool.allocate(note).map(|h| h.slot), Some(2));
        assert_eq!(pool.allocate(note).map(|h| h.slot), Some(b.slot));
        assert_eq!(pool.allocate(note).map(|h| h.slot), Some(a.slot));
    }

    #[test]
    fn test_stop_all() {
        let mut out = output(8);
        out.play_note(0, 0, 60, 1, 0);
        out.play_note(1, 3, 64, 1, 0);
        out.sink_mut().clear();

        out.stop_all(10);
        assert_eq!(out.pool().active_count(), 0);
        assert_eq!(out.sink().messages().len(), 2);
    }

    #[test]
    fn test_control_change_passes_through() {
        let mut out = output(1);
        out.set_control_change(0, 15, 7, 99, 3);
        assert_eq!(
            out.sink().messages(),
            &[OutputMessage::ControlChange { device: 0, channel: 15, cc: 7, value: 99, timestamp: 3 }]
        );
    }
}
