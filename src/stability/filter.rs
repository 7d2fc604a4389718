use super::window::{ObservationWindow, DEFAULT_CAPACITY};
use crate::types::events::{NoteEvent, NoteObservation, PitchObservation};
use crate::types::note::quantize;

pub const DEFAULT_REQUIRED_AGREEMENT: usize = 5;
pub const DEFAULT_AMPLITUDE_FLOOR: f32 = 0.001;
pub const DEFAULT_FREQUENCY_FLOOR: f32 = 20.0;

/// Parameters of the stability decision, snapshotted once per block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityConfig {
    /// Number of recent observations kept
    pub window_capacity: usize,
    /// Occurrences the majority note needs before it is declared stable
    pub required_agreement: usize,
    /// Mean squared amplitude at or below which a block is silence
    pub silence_amplitude_floor: f32,
    /// Frequency in Hz at or below which a block is silence
    pub silence_frequency_floor: f32,
}

impl StabilityConfig {
    /// Required agreement clamped to `[1, window_capacity]`
    pub fn effective_agreement(&self) -> usize {
        self.required_agreement.clamp(1, self.window_capacity.max(1))
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_CAPACITY,
            required_agreement: DEFAULT_REQUIRED_AGREEMENT,
            silence_amplitude_floor: DEFAULT_AMPLITUDE_FLOOR,
            silence_frequency_floor: DEFAULT_FREQUENCY_FLOOR,
        }
    }
}

/// Majority-vote jitter filter
/// Turns one pitch observation per block into at most one note transition
pub struct StabilityFilter {
    window: ObservationWindow,
    stable_note: Option<i32>,
}

impl StabilityFilter {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            window: ObservationWindow::new(window_capacity),
            stable_note: None,
        }
    }

    /// Currently declared note, if any
    pub fn stable_note(&self) -> Option<i32> {
        self.stable_note
    }

    /// Number of observations currently in the window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Apply the silence gate and quantize
    pub fn classify(observation: PitchObservation, config: &StabilityConfig) -> NoteObservation {
        // A NaN frequency fails both comparisons and counts as silence
        let voiced = observation.amplitude > config.silence_amplitude_floor
            && observation.frequency > config.silence_frequency_floor;

        if voiced {
            NoteObservation::Note(quantize(observation.frequency))
        } else {
            NoteObservation::Silence
        }
    }

    /// Process one block's observation
    pub fn observe(&mut self, observation: PitchObservation, config: &StabilityConfig) -> Option<NoteEvent> {
        self.observe_note(Self::classify(observation, config), config)
    }

    /// Process one already-quantized observation
    pub fn observe_note(&mut self, observation: NoteObservation, config: &StabilityConfig) -> Option<NoteEvent> {
        if self.window.capacity() != config.window_capacity.max(1) {
            self.window.set_capacity(config.window_capacity);
        }

        let note = match observation {
            NoteObservation::Silence => return self.silence(),
            NoteObservation::Note(note) => note,
        };

        self.window.push(note);

        let required = config.effective_agreement();
        if self.window.len() < required {
            return None;
        }

        let (majority, count) = self.window.majority()?;
        if count < required || self.stable_note == Some(majority) {
            return None;
        }

        self.stable_note = Some(majority);
        Some(NoteEvent::changed(majority))
    }

    /// End-of-session flush: release a sounding note without touching the window
    pub fn flush(&mut self) -> Option<NoteEvent> {
        self.stable_note.take().map(|_| NoteEvent::Off)
    }

    /// Forget everything, used at session start
    pub fn reset(&mut self) {
        self.window.clear();
        self.stable_note = None;
    }

    fn silence(&mut self) -> Option<NoteEvent> {
        self.window.clear();
        self.stable_note.take().map(|_| NoteEvent::Off)
    }
}

impl Default for StabilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::note::note_to_frequency;

    fn voiced(note: i32) -> PitchObservation {
        PitchObservation::new(note_to_frequency(note), 0.1)
    }

    fn silent() -> PitchObservation {
        PitchObservation::new(0.0, 0.0)
    }

    fn feed(filter: &mut StabilityFilter, config: &StabilityConfig, inputs: &[PitchObservation]) -> Vec<Option<NoteEvent>> {
        inputs.iter().map(|obs| filter.observe(*obs, config)).collect()
    }

    #[test]
    fn test_stable_note_emitted_once_on_threshold_block() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        let events = feed(&mut filter, &config, &[voiced(60); 12]);

        // Fires exactly on the fifth block, then stays quiet
        assert_eq!(events[4], Some(NoteEvent::changed(60)));
        let emitted: Vec<_> = events.iter().flatten().collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(filter.stable_note(), Some(60));
    }

    #[test]
    fn test_silence_after_note_emits_single_off_and_clears_window() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        feed(&mut filter, &config, &[voiced(60); 5]);
        assert_eq!(filter.observe(silent(), &config), Some(NoteEvent::Off));
        assert_eq!(filter.window_len(), 0);
        assert_eq!(filter.stable_note(), None);

        // Further silence is quiet
        assert_eq!(filter.observe(silent(), &config), None);

        // A fresh note needs the full agreement again
        let events = feed(&mut filter, &config, &[voiced(60); 5]);
        assert_eq!(&events[..4], &[None; 4]);
        assert_eq!(events[4], Some(NoteEvent::changed(60)));
    }

    #[test]
    fn test_silence_without_stable_note_is_quiet() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        feed(&mut filter, &config, &[voiced(60); 3]);
        assert_eq!(filter.observe(silent(), &config), None);
        assert_eq!(filter.window_len(), 0);
    }

    #[test]
    fn test_alternating_notes_never_emit() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        // Each note reaches at most 5 of 10 only after the window is full;
        // with agreement 6 the alternation stays suppressed forever
        let config = StabilityConfig { required_agreement: 6, ..config };
        let inputs: Vec<_> = (0..40).map(|i| voiced(if i % 2 == 0 { 60 } else { 61 })).collect();

        let events = feed(&mut filter, &config, &inputs);
        assert!(events.iter().all(Option::is_none));
        assert_eq!(filter.stable_note(), None);
    }

    #[test]
    fn test_half_window_agreement_follows_alternation() {
        // Agreement 5 of 10 is met by both halves of an even split, and the
        // newest note wins the tie, so a two-note trill changes every block
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();
        let inputs: Vec<_> = (0..40).map(|i| voiced(if i % 2 == 0 { 60 } else { 61 })).collect();

        let events = feed(&mut filter, &config, &inputs);
        assert!(events[..8].iter().all(Option::is_none));
        assert_eq!(events[8], Some(NoteEvent::changed(60)));
        assert_eq!(events[9], Some(NoteEvent::changed(61)));
        assert_eq!(events[10], Some(NoteEvent::changed(60)));
        assert_eq!(events.iter().filter(|e| e.is_some()).count(), 32);
        assert_eq!(filter.stable_note(), Some(61));
    }

    #[test]
    fn test_three_way_jitter_below_threshold_never_emits() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        let inputs: Vec<_> = (0..30).map(|i| voiced(60 + (i % 3))).collect();
        let events = feed(&mut filter, &config, &inputs);
        assert!(events.iter().all(Option::is_none));
    }

    #[test]
    fn test_full_window_without_majority_is_not_stable() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        let inputs = [60, 60, 60, 60, 62, 62, 62, 62, 64, 64].map(voiced);
        let events = feed(&mut filter, &config, &inputs);
        assert!(events.iter().all(Option::is_none));
        assert_eq!(filter.window_len(), 10);
    }

    #[test]
    fn test_note_change_carries_new_note() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        feed(&mut filter, &config, &[voiced(60); 10]);
        let events = feed(&mut filter, &config, &[voiced(64); 10]);

        // 64 overtakes 60 once it has 5 entries, tie resolved toward the newer note
        assert_eq!(events[4], Some(NoteEvent::changed(64)));
        assert_eq!(events.iter().flatten().count(), 1);
    }

    #[test]
    fn test_changed_event_never_repeats_stable_note() {
        let config = StabilityConfig { required_agreement: 2, ..StabilityConfig::default() };
        let mut filter = StabilityFilter::default();

        let pattern = [60, 60, 62, 62, 60, 60, 62, 62, 0, 62, 62, 62, 60];
        let mut previous: Option<i32> = None;
        for note in pattern {
            let observation = if note == 0 { silent() } else { voiced(note) };
            match filter.observe(observation, &config) {
                Some(NoteEvent::Changed { note }) => {
                    assert_ne!(Some(note), previous);
                    previous = Some(note);
                }
                Some(NoteEvent::Off) => previous = None,
                None => {}
            }
            assert_eq!(filter.stable_note(), previous);
        }
    }

    #[test]
    fn test_amplitude_and_frequency_floors() {
        let config = StabilityConfig::default();

        assert_eq!(
            StabilityFilter::classify(PitchObservation::new(440.0, 0.001), &config),
            NoteObservation::Silence
        );
        assert_eq!(
            StabilityFilter::classify(PitchObservation::new(20.0, 0.5), &config),
            NoteObservation::Silence
        );
        assert_eq!(
            StabilityFilter::classify(PitchObservation::new(f32::NAN, 0.5), &config),
            NoteObservation::Silence
        );
        assert_eq!(
            StabilityFilter::classify(PitchObservation::new(440.0, 0.0011), &config),
            NoteObservation::Note(69)
        );
    }

    #[test]
    fn test_agreement_change_applies_on_next_block() {
        let mut config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        feed(&mut filter, &config, &[voiced(60); 3]);
        config.required_agreement = 3;

        // Not re-evaluated until the next observation arrives
        assert_eq!(filter.stable_note(), None);
        assert_eq!(filter.observe(voiced(60), &config), Some(NoteEvent::changed(60)));
    }

    #[test]
    fn test_agreement_is_clamped_to_window() {
        let config = StabilityConfig {
            window_capacity: 4,
            required_agreement: 20,
            ..StabilityConfig::default()
        };
        assert_eq!(config.effective_agreement(), 4);

        let mut filter = StabilityFilter::new(4);
        let events = feed(&mut filter, &config, &[voiced(57); 4]);
        assert_eq!(events[3], Some(NoteEvent::changed(57)));

        let zero = StabilityConfig { required_agreement: 0, ..config };
        assert_eq!(zero.effective_agreement(), 1);
    }

    #[test]
    fn test_flush_and_reset() {
        let config = StabilityConfig::default();
        let mut filter = StabilityFilter::default();

        assert_eq!(filter.flush(), None);
        feed(&mut filter, &config, &[voiced(72); 5]);
        assert_eq!(filter.flush(), Some(NoteEvent::Off));
        assert_eq!(filter.flush(), None);

        filter.reset();
        assert_eq!(filter.window_len(), 0);
    }
}
