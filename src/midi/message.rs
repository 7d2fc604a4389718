/// MIDI channel voice messages we send
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
}

impl MidiMessage {
    /// Note on for a semitone index, clamped to the 0-127 wire range
    pub fn note_on(channel: u8, note: i32, velocity: u8) -> Self {
        MidiMessage::NoteOn {
            channel: channel & 0x0F,
            note: wire_note(note),
            velocity: velocity.min(127),
        }
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        MidiMessage::NoteOff {
            channel: channel & 0x0F,
            note: note.min(127),
            velocity: 0,
        }
    }

    /// Encode as standard MIDI protocol: [status, data1, data2]
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOn { channel, note, velocity } => {
                [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOff { channel, note, velocity } => {
                [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
        }
    }
}

/// Clamp a semitone index into the MIDI note range
pub fn wire_note(note: i32) -> u8 {
    note.clamp(0, 127) as u8
}
