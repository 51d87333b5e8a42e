// MIDI - Device discovery, control input and note/CC output

pub mod device;
pub mod event;
pub mod input;
pub mod output;

pub use device::{MidiDeviceInfo, MidiDeviceManager};
pub use event::MidiEvent;
pub use input::{ControlInput, ControlMessage};
pub use output::{
    MidiSink, MidirSink, NoteHandle, NoteOutput, NullSink, OutputMessage, PooledOutput,
    RecordingSink,
};

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI init error: {0}")]
    Init(String),

    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    #[error("MIDI connection failed: {0}")]
    Connect(String),
}
