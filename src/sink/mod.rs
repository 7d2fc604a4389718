//! Note event sinks: where stable note transitions end up

pub mod keyboard;
pub mod midi;

use crate::error::SinkError;
use crate::types::events::Delivery;

pub use keyboard::KeyboardSink;
pub use midi::MidiSink;

/// Receives note transitions from the session worker
/// Implementations never hold two notes or keys at once
pub trait NoteEventSink {
    /// Capability flag fixed at construction; unavailable sinks cannot start a session
    fn is_available(&self) -> bool {
        true
    }

    /// Short description for status lines
    fn describe(&self) -> String;

    /// Switch to a new note, releasing the previous one first
    fn on_note_changed(&mut self, note: i32) -> Result<Delivery, SinkError>;

    /// Release whatever is currently sounding or held
    fn on_note_off(&mut self) -> Result<(), SinkError>;

    /// Session shutdown: release everything still held
    fn release_all(&mut self) -> Result<(), SinkError> {
        self.on_note_off()
    }
}
