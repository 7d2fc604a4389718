//! Keyboard emulation backends

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::process::{Command, Stdio};

use crate::error::SinkError;

/// Presses and releases keys on the host
pub trait KeyEmitter {
    fn press(&mut self, key: &str) -> Result<(), SinkError>;
    fn release(&mut self, key: &str) -> Result<(), SinkError>;
}

/// Which keyboard backend a session should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackend {
    /// Spawn `xdotool keydown/keyup`
    #[default]
    Xdotool,
    /// Write xdotool command lines to stdout
    Print,
    /// No backend, keyboard sessions cannot start
    None,
}

/// Check that the configured backend can run
/// `None` means the capability is missing on this host
pub fn detect(backend: KeyBackend) -> Option<Box<dyn KeyEmitter>> {
    match backend {
        KeyBackend::Xdotool => XdotoolEmitter::detect().map(|e| Box::new(e) as Box<dyn KeyEmitter>),
        KeyBackend::Print => Some(Box::new(ScriptEmitter::new(io::stdout()))),
        KeyBackend::None => None,
    }
}

/// Key emulation through the `xdotool` command
pub struct XdotoolEmitter {
    program: String,
}

impl XdotoolEmitter {
    /// Returns `None` when `xdotool` cannot be run
    pub fn detect() -> Option<Self> {
        let available = Command::new("xdotool")
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if !available {
            warn!("xdotool not found; keyboard emulation unavailable");
            return None;
        }

        Some(Self {
            program: "xdotool".to_string(),
        })
    }

    fn run(&self, action: &str, key: &str) -> Result<(), SinkError> {
        debug!("{} {} {}", self.program, action, key);
        let status = Command::new(&self.program)
            .arg(action)
            .arg(key)
            .status()
            .map_err(|e| SinkError::Key {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SinkError::Key {
                key: key.to_string(),
                reason: format!("{} {} exited with {}", self.program, action, status),
            })
        }
    }
}

impl KeyEmitter for XdotoolEmitter {
    fn press(&mut self, key: &str) -> Result<(), SinkError> {
        self.run("keydown", key)
    }

    fn release(&mut self, key: &str) -> Result<(), SinkError> {
        self.run("keyup", key)
    }
}

/// Writes `keydown <key>` / `keyup <key>` lines, one per action
pub struct ScriptEmitter<W: Write> {
    out: W,
}

impl<W: Write> ScriptEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, action: &str, key: &str) -> Result<(), SinkError> {
        writeln!(self.out, "{} {}", action, key)
            .and_then(|_| self.out.flush())
            .map_err(|e| SinkError::Key {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

impl<W: Write> KeyEmitter for ScriptEmitter<W> {
    fn press(&mut self, key: &str) -> Result<(), SinkError> {
        self.line("keydown", key)
    }

    fn release(&mut self, key: &str) -> Result<(), SinkError> {
        self.line("keyup", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_emitter_lines() {
        let mut emitter = ScriptEmitter::new(Vec::new());
        emitter.press("a").unwrap();
        emitter.release("a").unwrap();

        let out = String::from_utf8(emitter.into_inner()).unwrap();
        assert_eq!(out, "keydown a\nkeyup a\n");
    }

    #[test]
    fn test_none_backend_is_unavailable() {
        assert!(detect(KeyBackend::None).is_none());
        assert!(detect(KeyBackend::Print).is_some());
    }

    #[test]
    fn test_backend_names() {
        let backend: KeyBackend = serde_yaml::from_str("print").unwrap();
        assert_eq!(backend, KeyBackend::Print);
        assert_eq!(KeyBackend::default(), KeyBackend::Xdotool);
    }
}
