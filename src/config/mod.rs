use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::session::{SessionSettings, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};
use crate::keys::emitter::KeyBackend;
use crate::pitch::estimator::DEFAULT_WINDOW_SIZE;
use crate::sink::midi::DEFAULT_VELOCITY;
use crate::stability::filter::{
    StabilityConfig, DEFAULT_AMPLITUDE_FLOOR, DEFAULT_FREQUENCY_FLOOR, DEFAULT_REQUIRED_AGREEMENT,
};
use crate::stability::window::DEFAULT_CAPACITY;

/// Largest observation window accepted from a config file
const MAX_WINDOW: usize = 64;

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub devices: DeviceConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub stability: StabilitySection,

    #[serde(default)]
    pub midi: MidiConfig,

    #[serde(default)]
    pub keyboard: KeyboardConfig,

    #[serde(default)]
    pub mode: OutputMode,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl SessionConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: SessionConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.audio.validate().context("Invalid audio section")?;
        self.stability.validate().context("Invalid stability section")?;
        self.midi.validate().context("Invalid midi section")?;
        Ok(())
    }

    /// Initial values for the shared stability parameters
    pub fn stability_config(&self) -> StabilityConfig {
        StabilityConfig {
            window_capacity: self.stability.window,
            required_agreement: self.stability.required,
            silence_amplitude_floor: self.stability.amplitude_floor,
            silence_frequency_floor: self.stability.frequency_floor,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            block_size: self.audio.block_size,
            analysis_window: DEFAULT_WINDOW_SIZE.max(self.audio.block_size),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            devices: DeviceConfig::default(),
            audio: AudioConfig::default(),
            stability: StabilitySection::default(),
            midi: MidiConfig::default(),
            keyboard: KeyboardConfig::default(),
            mode: OutputMode::default(),
            log_file: default_log_file(),
        }
    }
}

/// Device configuration; each entry is an index or a name substring
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audioin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midiout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(anyhow!("Sample rate must be between 8000 and 192000 Hz"));
        }
        if self.block_size < 64 || self.block_size > 16384 {
            return Err(anyhow!("Block size must be between 64 and 16384 frames"));
        }
        Ok(())
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StabilitySection {
    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_required")]
    pub required: usize,

    #[serde(default = "default_amplitude_floor")]
    pub amplitude_floor: f32,

    #[serde(default = "default_frequency_floor")]
    pub frequency_floor: f32,
}

impl StabilitySection {
    pub fn validate(&self) -> Result<()> {
        if self.window < 1 || self.window > MAX_WINDOW {
            return Err(anyhow!("Window must be between 1 and {}", MAX_WINDOW));
        }
        if self.required < 1 || self.required > self.window {
            return Err(anyhow!("Required agreement must be between 1 and the window size ({})", self.window));
        }
        if !(self.amplitude_floor >= 0.0) {
            return Err(anyhow!("Amplitude floor must be >= 0.0"));
        }
        if !(self.frequency_floor >= 0.0) {
            return Err(anyhow!("Frequency floor must be >= 0.0"));
        }
        Ok(())
    }
}

impl Default for StabilitySection {
    fn default() -> Self {
        Self {
            window: default_window(),
            required: default_required(),
            amplitude_floor: default_amplitude_floor(),
            frequency_floor: default_frequency_floor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// 1-16
    #[serde(default = "default_channel")]
    pub channel: u8,

    #[serde(default = "default_velocity")]
    pub velocity: u8,
}

impl MidiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel < 1 || self.channel > 16 {
            return Err(anyhow!("MIDI channel must be between 1 and 16"));
        }
        // Velocity 0 would read as note off on most receivers
        if self.velocity < 1 || self.velocity > 127 {
            return Err(anyhow!("Velocity must be between 1 and 127"));
        }
        Ok(())
    }

    /// Get the 0-indexed channel for the wire
    pub fn channel_index(&self) -> u8 {
        self.channel.saturating_sub(1)
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            velocity: default_velocity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyboardConfig {
    /// Explicit mapping file; otherwise the first file in `mapping_dir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<PathBuf>,

    #[serde(default = "default_mapping_dir")]
    pub mapping_dir: PathBuf,

    #[serde(default)]
    pub backend: KeyBackend,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            mapping: None,
            mapping_dir: default_mapping_dir(),
            backend: KeyBackend::default(),
        }
    }
}

/// Where stable notes are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Midi,
    Keys,
}

impl OutputMode {
    pub fn toggled(self) -> Self {
        match self {
            OutputMode::Midi => OutputMode::Keys,
            OutputMode::Keys => OutputMode::Midi,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputMode::Midi => "MIDI",
            OutputMode::Keys => "Keyboard",
        }
    }
}

// Default value functions for serde
fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_window() -> usize {
    DEFAULT_CAPACITY
}

fn default_required() -> usize {
    DEFAULT_REQUIRED_AGREEMENT
}

fn default_amplitude_floor() -> f32 {
    DEFAULT_AMPLITUDE_FLOOR
}

fn default_frequency_floor() -> f32 {
    DEFAULT_FREQUENCY_FLOOR
}

fn default_channel() -> u8 {
    1
}

fn default_velocity() -> u8 {
    DEFAULT_VELOCITY
}

fn default_mapping_dir() -> PathBuf {
    PathBuf::from("mappings")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("stylomidi.log")
}
