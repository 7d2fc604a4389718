use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use super::filter::StabilityConfig;

/// Thread-safe stability settings using atomic operations
/// The UI writes, the session worker snapshots once per block without blocking
pub struct StabilityParameters {
    /// Observation window length
    pub window_capacity: AtomicUsize,
    /// Agreement needed to declare a note
    pub required_agreement: AtomicUsize,
    /// Mean squared amplitude silence floor
    pub amplitude_floor: AtomicF32,
    /// Frequency silence floor in Hz
    pub frequency_floor: AtomicF32,
}

impl StabilityParameters {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            window_capacity: AtomicUsize::new(config.window_capacity),
            required_agreement: AtomicUsize::new(config.required_agreement),
            amplitude_floor: AtomicF32::new(config.silence_amplitude_floor),
            frequency_floor: AtomicF32::new(config.silence_frequency_floor),
        }
    }

    /// Read every field for this block
    pub fn snapshot(&self) -> StabilityConfig {
        StabilityConfig {
            window_capacity: self.window_capacity.load(Ordering::Relaxed),
            required_agreement: self.required_agreement.load(Ordering::Relaxed),
            silence_amplitude_floor: self.amplitude_floor.load(Ordering::Relaxed),
            silence_frequency_floor: self.frequency_floor.load(Ordering::Relaxed),
        }
    }

    pub fn required_agreement(&self) -> usize {
        self.required_agreement.load(Ordering::Relaxed)
    }

    /// Set the required agreement, clamped to `[1, window_capacity]`
    /// Returns the value actually stored
    pub fn set_required_agreement(&self, value: usize) -> usize {
        let capacity = self.window_capacity.load(Ordering::Relaxed).max(1);
        let value = value.clamp(1, capacity);
        self.required_agreement.store(value, Ordering::Relaxed);
        value
    }

    /// Step the required agreement up or down by one
    pub fn adjust_required_agreement(&self, delta: isize) -> usize {
        let current = self.required_agreement() as isize;
        self.set_required_agreement((current + delta).max(1) as usize)
    }
}

impl Default for StabilityParameters {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

/// Atomic f32 wrapper for lock-free parameter updates
pub struct AtomicF32 {
    storage: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            storage: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn load(&self, ordering: Ordering) -> f32 {
        f32::from_bits(self.storage.load(ordering))
    }

    pub fn store(&self, value: f32, ordering: Ordering) {
        self.storage.store(value.to_bits(), ordering);
    }
}
