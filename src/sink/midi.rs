use log::{debug, warn};

use super::NoteEventSink;
use crate::error::SinkError;
use crate::midi::message::{wire_note, MidiMessage};
use crate::midi::output::MidiPort;
use crate::types::events::Delivery;

pub const DEFAULT_VELOCITY: u8 = 64;

/// Sends note-on/note-off pairs to a MIDI port
/// At most one note is left sounding at any time
pub struct MidiSink<P: MidiPort> {
    port: P,
    /// 0-15 on the wire
    channel: u8,
    velocity: u8,
    sounding: Option<u8>,
    label: String,
}

impl<P: MidiPort> MidiSink<P> {
    pub fn new(port: P, channel: u8, velocity: u8, label: impl Into<String>) -> Self {
        Self {
            port,
            channel: channel & 0x0F,
            velocity: velocity.min(127),
            sounding: None,
            label: label.into(),
        }
    }

    /// Note currently sounding, if any
    #[cfg(test)]
    pub fn sounding(&self) -> Option<u8> {
        self.sounding
    }

    fn stop_sounding(&mut self) -> Result<(), SinkError> {
        if let Some(note) = self.sounding.take() {
            debug!("MIDI note off {} ch{}", note, self.channel + 1);
            self.port.send(MidiMessage::note_off(self.channel, note))?;
        }
        Ok(())
    }
}

impl<P: MidiPort> NoteEventSink for MidiSink<P> {
    fn describe(&self) -> String {
        format!("MIDI {} ch{}", self.label, self.channel + 1)
    }

    fn on_note_changed(&mut self, note: i32) -> Result<Delivery, SinkError> {
        self.stop_sounding()?;

        let wire = wire_note(note);
        if wire as i32 != note {
            warn!("Note {} outside MIDI range, sending {}", note, wire);
        }

        debug!("MIDI note on {} ch{} vel{}", wire, self.channel + 1, self.velocity);
        self.port
            .send(MidiMessage::note_on(self.channel, note, self.velocity))?;
        self.sounding = Some(wire);

        Ok(Delivery::Midi { note: wire })
    }

    fn on_note_off(&mut self) -> Result<(), SinkError> {
        self.stop_sounding()
    }
}

impl<P: MidiPort> Drop for MidiSink<P> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_sounding() {
            warn!("Failed to release MIDI note on drop: {}", e);
        }
    }
}
