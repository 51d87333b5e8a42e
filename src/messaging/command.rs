// Commands - Control thread -> sequencer thread

use crate::sequencer::Pattern;
use crate::sequencer::edit::{ParamAddress, ParamEdit};

/// Requests applied by the sequencer thread between pulses
#[derive(Debug)]
pub enum Command {
    /// Start playback; restarts from the top when already running
    Start,
    Stop,
    Edit {
        address: ParamAddress,
        edit: ParamEdit,
    },
    /// Replace the pattern content with a fully parsed pattern
    ApplyPattern(Box<Pattern>),
    /// Ask for a `PatternSnapshot` event
    RequestSnapshot,
}

impl Command {
    pub fn edit(address: ParamAddress, edit: ParamEdit) -> Self {
        Command::Edit { address, edit }
    }
}
