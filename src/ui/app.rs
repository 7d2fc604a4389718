use std::sync::Arc;

use crate::config::OutputMode;
use crate::keys::mapping::{KeyMapping, MappingCatalog};
use crate::stability::parameters::StabilityParameters;
use crate::types::events::{Delivery, Notification};
use crate::types::note::note_name;

/// Level meter floor in dB
pub const METER_FLOOR_DB: f32 = -60.0;

/// Action the UI asks the driver loop to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Start,
    Stop,
}

/// UI application state
/// Mirrors what the session worker reports; never touches devices itself
pub struct App {
    /// Output mode for the next session
    pub mode: OutputMode,
    /// Whether a session is running
    pub running: bool,
    /// Latest status line
    pub status: String,
    /// Current stable note, if one is sounding
    pub note: Option<i32>,
    /// What the sink did with the current note
    pub delivery: Option<Delivery>,
    /// Latest raw frequency estimate
    pub frequency: f32,
    /// Latest block mean square
    pub amplitude: f32,
    /// Overflows reported by the last finished session
    pub overflows: u64,
    /// Mapping files to choose from
    pub catalog: MappingCatalog,
    /// Mapping loaded from the selected file
    pub mapping: KeyMapping,
    /// Key mapping rows for the keyboard mode panel
    pub mapping_rows: Vec<(i32, String)>,
    /// Whether to quit the application
    pub should_quit: bool,
    /// Reference to shared parameters
    pub parameters: Arc<StabilityParameters>,
    request: Option<Request>,
}

impl App {
    pub fn new(parameters: Arc<StabilityParameters>, mode: OutputMode, catalog: MappingCatalog) -> Self {
        let mapping = catalog.load_selected();
        Self {
            mode,
            running: false,
            status: "Stopped. Press Space to start".to_string(),
            note: None,
            delivery: None,
            frequency: 0.0,
            amplitude: 0.0,
            overflows: 0,
            mapping_rows: rows(&mapping),
            catalog,
            mapping,
            should_quit: false,
            parameters,
            request: None,
        }
    }

    /// Fold one worker notification into the display state
    pub fn apply(&mut self, notification: Notification) {
        match notification {
            Notification::Status(status) => self.status = status,
            Notification::NoteChanged { note, delivery } => {
                self.note = Some(note);
                self.delivery = Some(delivery);
            }
            Notification::NoteOff => {
                self.note = None;
                self.delivery = None;
            }
            Notification::Level { frequency, amplitude } => {
                self.frequency = frequency;
                self.amplitude = amplitude;
            }
            Notification::Stopped { error, overflows } => {
                self.running = false;
                self.note = None;
                self.delivery = None;
                self.frequency = 0.0;
                self.amplitude = 0.0;
                self.overflows = overflows;
                self.status = match error {
                    Some(error) => format!("Stopped: {}", error),
                    None => "Stopped. Press Space to start".to_string(),
                };
            }
        }
    }

    /// Ask the driver to start or stop, depending on the current state
    pub fn toggle_running(&mut self) {
        self.request = Some(if self.running { Request::Stop } else { Request::Start });
    }

    /// Take the pending request, if any
    pub fn take_request(&mut self) -> Option<Request> {
        self.request.take()
    }

    /// Mark the session as started by the driver
    pub fn started(&mut self) {
        self.running = true;
        self.overflows = 0;
    }

    /// Report a start failure
    pub fn start_failed(&mut self, reason: impl std::fmt::Display) {
        self.running = false;
        self.status = format!("Failed to start: {}", reason);
    }

    /// Switch output mode; ignored while running
    pub fn toggle_mode(&mut self) {
        if self.running {
            self.status = "Stop processing before switching mode".to_string();
            return;
        }
        self.mode = self.mode.toggled();
        self.status = format!("Mode: {}", self.mode.label());
    }

    /// Load the next mapping file; ignored while running
    pub fn next_mapping(&mut self) {
        if self.running {
            self.status = "Stop processing before switching mapping".to_string();
            return;
        }
        self.catalog.select_next();
        self.reload_mapping();
    }

    /// Rescan the mapping directory and reload the selection; ignored while running
    pub fn refresh_mappings(&mut self) {
        if self.running {
            self.status = "Stop processing before refreshing mappings".to_string();
            return;
        }
        if let Err(e) = self.catalog.refresh() {
            self.status = format!("Cannot refresh mappings: {}", e);
            return;
        }
        self.reload_mapping();
    }

    /// Selected mapping file name, or a dash
    pub fn mapping_label(&self) -> String {
        self.catalog
            .selected()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "-".to_string())
    }

    fn reload_mapping(&mut self) {
        self.mapping = self.catalog.load_selected();
        self.mapping_rows = rows(&self.mapping);
        self.status = format!(
            "Mapping: {} ({} of {}, {} notes)",
            self.mapping_label(),
            self.catalog.files().iter().position(|p| Some(p.as_path()) == self.catalog.selected()).map_or(0, |i| i + 1),
            self.catalog.files().len(),
            self.mapping.len()
        );
    }

    pub fn increase_stability(&mut self) {
        let value = self.parameters.adjust_required_agreement(1);
        self.status = format!("Stability: {}", value);
    }

    pub fn decrease_stability(&mut self) {
        let value = self.parameters.adjust_required_agreement(-1);
        self.status = format!("Stability: {}", value);
    }

    pub fn required_agreement(&self) -> usize {
        self.parameters.required_agreement()
    }

    pub fn window_capacity(&self) -> usize {
        self.parameters.snapshot().window_capacity
    }

    /// Current note as `60 (C4)`, or a dash
    pub fn note_label(&self) -> String {
        match self.note {
            Some(note) => format!("{} ({})", note, note_name(note)),
            None => "-".to_string(),
        }
    }

    /// What the current note was turned into
    pub fn delivery_label(&self) -> String {
        match &self.delivery {
            Some(Delivery::Midi { note }) => format!("MIDI note {}", note),
            Some(Delivery::Key(key)) => format!("Key: {}", key),
            Some(Delivery::Unmapped) => "not mapped".to_string(),
            None => "-".to_string(),
        }
    }

    /// Block level in dB, clamped to the meter floor
    pub fn level_db(&self) -> f32 {
        if self.amplitude <= 0.0 {
            return METER_FLOOR_DB;
        }
        (10.0 * self.amplitude.log10()).clamp(METER_FLOOR_DB, 0.0)
    }

    /// Quit application
    pub fn quit(&mut self) {
        if self.running {
            self.request = Some(Request::Stop);
        }
        self.should_quit = true;
    }
}

fn rows(mapping: &KeyMapping) -> Vec<(i32, String)> {
    mapping.entries().map(|(note, key)| (note, key.to_string())).collect()
}
