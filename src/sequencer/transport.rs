// Transport - Run state published by the sequencer thread
// Lock-free reads for the control thread via atomics

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};

/// Transport state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }
}

/// Shared sequencer state
///
/// Written only by the sequencer thread. Each field is a single atomic, so
/// a reader always sees the last committed value of that field.
#[derive(Debug)]
pub struct SharedSequencerState {
    playing: AtomicBool,
    pulse: AtomicI64,
    elapsed_ms: AtomicU64,
    tempo: AtomicU32,
}

impl SharedSequencerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            playing: AtomicBool::new(false),
            pulse: AtomicI64::new(-1),
            elapsed_ms: AtomicU64::new(0),
            tempo: AtomicU32::new(0),
        })
    }

    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    /// Last emitted clock pulse, -1 before the first
    pub fn pulse(&self) -> i64 {
        self.pulse.load(Ordering::Relaxed)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::Relaxed)
    }

    pub fn tempo(&self) -> u32 {
        self.tempo.load(Ordering::Relaxed)
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub(crate) fn set_position(&self, pulse: i64, elapsed_ms: u64) {
        self.pulse.store(pulse, Ordering::Relaxed);
        self.elapsed_ms.store(elapsed_ms, Ordering::Relaxed);
    }

    pub(crate) fn set_tempo(&self, bpm: u32) {
        self.tempo.store(bpm, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SharedSequencerState::new();
        assert_eq!(state.state(), TransportState::Stopped);
        assert_eq!(state.pulse(), -1);
        assert_eq!(state.elapsed_ms(), 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let state = SharedSequencerState::new();
        let writer = Arc::clone(&state);

        std::thread::spawn(move || {
            writer.set_position(47, 1000);
            writer.set_playing(true);
        })
        .join()
        .unwrap();

        assert!(state.is_playing());
        assert_eq!(state.pulse(), 47);
        assert_eq!(state.elapsed_ms(), 1000);
    }
}
