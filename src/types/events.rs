/// One pitch estimate per audio block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchObservation {
    /// Estimated fundamental in Hz (0.0 when the estimator found no pitch)
    pub frequency: f32,
    /// Mean squared sample value over the block
    pub amplitude: f32,
}

impl PitchObservation {
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Self { frequency, amplitude }
    }
}

/// Quantized classification of one pitch observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteObservation {
    Silence,
    Note(i32),
}

/// Transition decided by the stability filter
/// At most one is produced per processed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    /// A new stable note, always different from the previous one
    Changed { note: i32 },
    /// The stable note dropped to silence
    Off,
}

impl NoteEvent {
    /// Create a note changed event
    pub fn changed(note: i32) -> Self {
        NoteEvent::Changed { note }
    }
}

/// What a sink did with a note change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// MIDI note-on sent with the (clamped) wire note
    Midi { note: u8 },
    /// Key currently held for the note
    Key(String),
    /// Keyboard mapping has no entry for the note
    Unmapped,
}

/// One-way notifications from the session worker to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Status(String),
    NoteChanged { note: i32, delivery: Delivery },
    NoteOff,
    /// Raw per-block reading, for the level meter
    Level { frequency: f32, amplitude: f32 },
    /// The worker has flushed, released everything and exited
    Stopped { error: Option<String>, overflows: u64 },
}
