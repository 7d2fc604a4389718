use std::path::PathBuf;

use thiserror::Error;

/// Failures delivering an event to a note sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("MIDI send failed: {0}")]
    Midi(String),

    #[error("key emulation failed for '{key}': {reason}")]
    Key { key: String, reason: String },
}

/// Session-level failures
///
/// `Device` and `Sink` end a running session. `SinkUnavailable` and `Config`
/// prevent one from starting. `MappingLoad` is recovered by falling back to an
/// empty mapping.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("audio device error: {0}")]
    Device(String),

    #[error("output unavailable: {0}")]
    SinkUnavailable(String),

    #[error("failed to load key mapping {}: {reason}", path.display())]
    MappingLoad { path: PathBuf, reason: String },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("invalid session settings: {0}")]
    Config(String),
}

impl SessionError {
    pub fn device(err: impl std::fmt::Display) -> Self {
        SessionError::Device(err.to_string())
    }
}
