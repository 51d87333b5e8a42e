// MIDI Input - Control surface messages from a midir input port

use crate::messaging::channels::ControlProducer;
use crate::midi::MidiError;
use crate::midi::device::MidiDeviceManager;
use crate::midi::event::MidiEvent;
use midir::{Ignore, MidiInputConnection};
use ringbuf::traits::Producer;

/// A control change received from the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub controller: u8,
    pub value: u8,
}

impl ControlMessage {
    /// Extract a control change from a raw message (any channel)
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match MidiEvent::from_bytes(bytes)? {
            MidiEvent::ControlChange {
                controller, value, ..
            } => Some(Self { controller, value }),
            _ => None,
        }
    }
}

/// Open connection to the control surface input port
pub struct ControlInput {
    _connection: MidiInputConnection<()>,
}

impl ControlInput {
    /// Connect to `port_name` and forward control changes to `control_tx`
    pub fn connect(port_name: &str, mut control_tx: ControlProducer) -> Result<Self, MidiError> {
        let (mut midi_in, port) = MidiDeviceManager::new().input_port_by_name(port_name)?;
        midi_in.ignore(Ignore::All);

        let connection = midi_in
            .connect(
                &port,
                "ssq-control-input",
                move |_timestamp, message, _| {
                    // MIDI callback - runs on the midir thread
                    if let Some(control) = ControlMessage::from_bytes(message) {
                        // try_push is not blocking
                        if control_tx.try_push(control).is_err() {
                            log::warn!("Control buffer full, message ignored");
                        }
                    }
                },
                (),
            )
            .map_err(|e| MidiError::Connect(format!("{}: {}", port_name, e)))?;

        log::info!("Connected to MIDI input: {}", port_name);
        Ok(Self {
            _connection: connection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_from_cc() {
        assert_eq!(
            ControlMessage::from_bytes(&[0xB4, 81, 0x7F]),
            Some(ControlMessage {
                controller: 81,
                value: 127
            })
        );
    }

    #[test]
    fn test_notes_are_not_control_messages() {
        assert_eq!(ControlMessage::from_bytes(&[0x90, 60, 100]), None);
        assert_eq!(ControlMessage::from_bytes(&[0xB0, 1]), None);
    }
}
