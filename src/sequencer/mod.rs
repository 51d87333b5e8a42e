// Sequencer module - Pattern model, clock and the sequencer thread
// Four sequences of eight lines, each line a 32 step row driving MIDI output

pub mod clock;
pub mod edit;
pub mod engine;
pub mod line;
pub mod pattern;
pub mod persistence;
pub mod resolve;
pub mod sequence;
pub mod transport;

/// Sequences per pattern
pub const NUM_SEQUENCES: usize = 4;
/// Lines per sequence
pub const NUM_LINES: usize = 8;
/// Steps per line
pub const NUM_STEPS: usize = 32;
/// Connection sources a connectable parameter can select (two banks of lines)
pub const NUM_SOURCES: usize = 16;
/// Active parameter slots per line
pub const NUM_LINE_PARAMS: usize = 16;
/// Global parameter slots
pub const NUM_GLOBAL_PARAMS: usize = 8;
/// Clock pulses per quarter note
pub const PPQ: u32 = 24;

pub use clock::Clock;
pub use edit::{ParamAddress, ParamEdit};
pub use engine::{Sequencer, SequencerHandle, SequencerOptions};
pub use line::{Line, LineMode, LineParam, PlayMode, StepMode, StepTrigger};
pub use pattern::{Pattern, TEMPO_SLOT};
pub use persistence::{PATTERN_MAGIC, PATTERN_VERSION, PatternError, write_pattern_file};
pub use resolve::{PulsePlan, Resolver};
pub use sequence::Sequence;
pub use transport::{SharedSequencerState, TransportState};
