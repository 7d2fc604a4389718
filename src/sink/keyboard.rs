use log::{debug, warn};

use super::NoteEventSink;
use crate::error::SinkError;
use crate::keys::emitter::KeyEmitter;
use crate::keys::mapping::KeyMapping;
use crate::types::events::Delivery;

/// Presses the key mapped to the current note
/// At most one key is held at any time
pub struct KeyboardSink {
    mapping: KeyMapping,
    emitter: Option<Box<dyn KeyEmitter>>,
    held: Option<String>,
}

impl KeyboardSink {
    /// `emitter` is the detected backend; `None` makes the sink unavailable
    pub fn new(mapping: KeyMapping, emitter: Option<Box<dyn KeyEmitter>>) -> Self {
        Self {
            mapping,
            emitter,
            held: None,
        }
    }

    /// Key currently held down, if any
    #[cfg(test)]
    pub fn held(&self) -> Option<&str> {
        self.held.as_deref()
    }

    fn release_held(&mut self) -> Result<(), SinkError> {
        if let (Some(key), Some(emitter)) = (self.held.take(), self.emitter.as_mut()) {
            debug!("Releasing key {}", key);
            emitter.release(&key)?;
        }
        Ok(())
    }
}

impl NoteEventSink for KeyboardSink {
    fn is_available(&self) -> bool {
        self.emitter.is_some()
    }

    fn describe(&self) -> String {
        format!("keyboard ({} mapped notes)", self.mapping.len())
    }

    fn on_note_changed(&mut self, note: i32) -> Result<Delivery, SinkError> {
        let Some(key) = self.mapping.key_for(note).map(str::to_string) else {
            // Unmapped notes leave any held key alone
            return Ok(Delivery::Unmapped);
        };

        if self.held.as_deref() == Some(key.as_str()) {
            return Ok(Delivery::Key(key));
        }

        self.release_held()?;

        if let Some(emitter) = self.emitter.as_mut() {
            debug!("Pressing key {} for note {}", key, note);
            emitter.press(&key)?;
            self.held = Some(key.clone());
        }

        Ok(Delivery::Key(key))
    }

    fn on_note_off(&mut self) -> Result<(), SinkError> {
        self.release_held()
    }
}

impl Drop for KeyboardSink {
    fn drop(&mut self) {
        if let Err(e) = self.release_held() {
            warn!("Failed to release key on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingEmitter {
        actions: Arc<Mutex<Vec<String>>>,
    }

    impl KeyEmitter for RecordingEmitter {
        fn press(&mut self, key: &str) -> Result<(), SinkError> {
            self.actions.lock().unwrap().push(format!("+{}", key));
            Ok(())
        }

        fn release(&mut self, key: &str) -> Result<(), SinkError> {
            self.actions.lock().unwrap().push(format!("-{}", key));
            Ok(())
        }
    }

    fn sink_with(emitter: &RecordingEmitter) -> KeyboardSink {
        let mapping = KeyMapping::parse("C4,a\nD4,s\nE4,s\n");
        KeyboardSink::new(mapping, Some(Box::new(emitter.clone())))
    }

    fn actions(emitter: &RecordingEmitter) -> Vec<String> {
        emitter.actions.lock().unwrap().clone()
    }

    #[test]
    fn test_switching_keys_releases_first() {
        let emitter = RecordingEmitter::default();
        let mut sink = sink_with(&emitter);

        assert_eq!(sink.on_note_changed(60).unwrap(), Delivery::Key("a".to_string()));
        sink.on_note_changed(62).unwrap();
        sink.on_note_off().unwrap();

        assert_eq!(actions(&emitter), vec!["+a", "-a", "+s", "-s"]);
        assert_eq!(sink.held(), None);
    }

    #[test]
    fn test_unmapped_note_emits_nothing() {
        let emitter = RecordingEmitter::default();
        let mut sink = sink_with(&emitter);

        sink.on_note_changed(60).unwrap();
        assert_eq!(sink.on_note_changed(61).unwrap(), Delivery::Unmapped);

        assert_eq!(actions(&emitter), vec!["+a"]);
        assert_eq!(sink.held(), Some("a"));
    }

    #[test]
    fn test_same_key_for_new_note_is_not_repressed() {
        let emitter = RecordingEmitter::default();
        let mut sink = sink_with(&emitter);

        sink.on_note_changed(62).unwrap();
        assert_eq!(sink.on_note_changed(64).unwrap(), Delivery::Key("s".to_string()));
        assert_eq!(actions(&emitter), vec!["+s"]);
    }

    #[test]
    fn test_drop_releases_held_key() {
        let emitter = RecordingEmitter::default();
        {
            let mut sink = sink_with(&emitter);
            sink.on_note_changed(60).unwrap();
        }
        assert_eq!(actions(&emitter), vec!["+a", "-a"]);
    }

    #[test]
    fn test_missing_backend_is_unavailable() {
        let sink = KeyboardSink::new(KeyMapping::new(), None);
        assert!(!sink.is_available());
        assert!(sink_with(&RecordingEmitter::default()).is_available());
    }
}
