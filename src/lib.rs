// ssq - MIDI step sequencer library exports for tests and benchmarks

pub mod config;
pub mod control;
pub mod messaging;
pub mod midi;
pub mod param;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError};
pub use control::{ControlAction, ControlSurface};
pub use messaging::{Command, SequencerEvent};
pub use midi::{MidiEvent, NoteOutput, PooledOutput, RecordingSink};
pub use param::{ConnectionRules, ParamClass, Parameter};
pub use sequencer::{
    Clock, Line, LineParam, ParamAddress, ParamEdit, Pattern, PatternError, Sequence, Sequencer,
    SequencerHandle, SequencerOptions, SharedSequencerState,
};
