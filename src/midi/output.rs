use anyhow::Result;
use log::info;
use midir::{MidiOutput, MidiOutputConnection};

use super::message::MidiMessage;
use crate::devices::find_device;
use crate::error::{SessionError, SinkError};

const CLIENT_NAME: &str = "stylomidi-output";

/// Destination for encoded MIDI messages
pub trait MidiPort {
    fn send(&mut self, message: MidiMessage) -> Result<(), SinkError>;
}

/// MIDI output connection
/// Opened once per session, the port is closed when dropped
pub struct MidiConnection {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidiConnection {
    /// Connect to an output port by index or name substring, or the first port
    pub fn connect(search: Option<&str>) -> Result<Self, SessionError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| SessionError::SinkUnavailable(format!("MIDI backend unavailable: {}", e)))?;

        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(SessionError::SinkUnavailable(
                "No MIDI output ports available".to_string(),
            ));
        }

        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect();

        let index = match search {
            Some(search) => find_device(&names, search, "MIDI output")
                .map_err(|e| SessionError::SinkUnavailable(e.to_string()))?,
            None => 0,
        };

        let port_name = names[index].clone();
        info!("Connecting MIDI output to: {}", port_name);

        let connection = midi_out
            .connect(&ports[index], CLIENT_NAME)
            .map_err(|e| SessionError::SinkUnavailable(format!("Failed to connect to MIDI port: {}", e)))?;

        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// List all available MIDI output ports
    pub fn list_devices() -> Result<Vec<String>> {
        let midi_out = MidiOutput::new("stylomidi-list")?;
        let ports = midi_out.ports();

        let mut devices = Vec::new();
        for port in ports.iter() {
            if let Ok(name) = midi_out.port_name(port) {
                devices.push(name);
            }
        }

        Ok(devices)
    }
}

impl MidiPort for MidiConnection {
    fn send(&mut self, message: MidiMessage) -> Result<(), SinkError> {
        self.connection
            .send(&message.to_bytes())
            .map_err(|e| SinkError::Midi(e.to_string()))
    }
}
