// MIDI device discovery - Port listing and lookup by name

use midir::{MidiInput as MidirInput, MidiInputPort, MidiOutput as MidirOutput, MidiOutputConnection};

use super::MidiError;

const CLIENT_NAME: &str = "ssq";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiDeviceInfo {
    pub index: usize,
    pub name: String,
}

pub struct MidiDeviceManager;

impl MidiDeviceManager {
    pub fn new() -> Self {
        Self
    }

    /// List all MIDI input ports
    pub fn list_input_ports(&self) -> Vec<MidiDeviceInfo> {
        let Ok(midi_in) = MidirInput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_in.port_name(port).ok()?;
                Some(MidiDeviceInfo { index, name })
            })
            .collect()
    }

    /// List all MIDI output ports
    pub fn list_output_ports(&self) -> Vec<MidiDeviceInfo> {
        let Ok(midi_out) = MidirOutput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_out.port_name(port).ok()?;
                Some(MidiDeviceInfo { index, name })
            })
            .collect()
    }

    /// Find an input port by its exact name
    pub fn input_port_by_name(&self, device_name: &str) -> Result<(MidirInput, MidiInputPort), MidiError> {
        let midi_in = MidirInput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).is_ok_and(|name| name == device_name))
            .ok_or_else(|| MidiError::PortNotFound(device_name.to_string()))?;

        Ok((midi_in, port))
    }

    /// Open an output port by its exact name
    pub fn open_output(&self, device_name: &str) -> Result<MidiOutputConnection, MidiError> {
        let midi_out = MidirOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).is_ok_and(|name| name == device_name))
            .ok_or_else(|| MidiError::PortNotFound(device_name.to_string()))?;

        let connection = midi_out
            .connect(&port, "ssq-output")
            .map_err(|e| MidiError::Connect(format!("{}: {}", device_name, e)))?;
        log::info!("Connected to MIDI output: {}", device_name);
        Ok(connection)
    }
}

impl Default for MidiDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
