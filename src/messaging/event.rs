// Sequencer events - Sequencer thread -> control thread

use crate::param::Parameter;
use crate::sequencer::edit::ParamAddress;

/// State changes reported by the sequencer thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    Started,
    Stopped,
    TempoChanged(u32),
    /// A parameter took a new raw value; `controller` is its 0-127 form
    ParamChanged {
        address: ParamAddress,
        value: i32,
        controller: u8,
    },
    /// Line mode changed; its layout and step tables were re-initialised
    LineModeChanged { sequence: usize, line: usize },
    FirstLastChanged { sequence: usize, line: usize },
    /// Serialized pattern image, ready to be written to disk
    PatternSnapshot(Vec<u8>),
    PatternApplied,
    /// Emitted on every quarter note while running
    Beat(i64),
}

impl SequencerEvent {
    pub fn param_changed(address: ParamAddress, param: &Parameter) -> Self {
        SequencerEvent::ParamChanged {
            address,
            value: param.get(),
            controller: param.controller_value(),
        }
    }
}
