/// Semitone arithmetic using equal temperament
/// A440 tuning: MIDI note 69 = 440 Hz

const A4: f32 = 440.0;
const A4_MIDI: i32 = 69;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Quantize a frequency in Hz to the nearest semitone index
/// Only defined for positive frequencies; the silence gate filters the rest
pub fn quantize(frequency: f32) -> i32 {
    let semitones = 12.0 * (frequency / A4).log2();
    A4_MIDI + semitones.round() as i32
}

/// Convert a semitone index to its frequency in Hz
/// Uses equal temperament: f = 440 * 2^((n-69)/12)
pub fn note_to_frequency(note: i32) -> f32 {
    let semitones = note - A4_MIDI;
    A4 * 2.0_f32.powf(semitones as f32 / 12.0)
}

/// Scientific pitch name for a semitone index, e.g. 60 -> "C4"
pub fn note_name(note: i32) -> String {
    let pitch_class = note.rem_euclid(12) as usize;
    let octave = note.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class], octave)
}

/// Parse a scientific pitch name into a semitone index
/// Examples: "C4" -> 60, "F#3" -> 54, "Bb-1" -> 10
/// Letter A-G (either case), optional '#' or 'b', then an integer octave
pub fn parse_note_name(name: &str) -> Option<i32> {
    let mut chars = name.trim().chars();

    let base_note = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (offset, octave_str) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    let octave: i32 = octave_str.parse().ok()?;

    // C-1 = 0, C0 = 12, C4 = 60
    octave.checked_add(1)?.checked_mul(12)?.checked_add(base_note + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_octaves_of_a() {
        assert_eq!(quantize(440.0), 69);
        assert_eq!(quantize(220.0), 57);
        assert_eq!(quantize(880.0), 81);
    }

    #[test]
    fn test_quantize_rounds_to_nearest() {
        // 40 cents sharp of A4 still rounds to A4, 60 cents sharp rounds up
        assert_eq!(quantize(440.0 * 2.0_f32.powf(0.4 / 12.0)), 69);
        assert_eq!(quantize(440.0 * 2.0_f32.powf(0.6 / 12.0)), 70);
        assert_eq!(quantize(261.63), 60);
    }

    #[test]
    fn test_note_to_frequency_round_trips_through_quantize() {
        for note in 21..=108 {
            assert_eq!(quantize(note_to_frequency(note)), note);
        }
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(54), "F#3");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn test_parse_note_name() {
        assert_eq!(parse_note_name("C4"), Some(60));
        assert_eq!(parse_note_name("F#3"), Some(54));
        assert_eq!(parse_note_name("Db4"), Some(61));
        assert_eq!(parse_note_name("a4"), Some(69));
        assert_eq!(parse_note_name("C-1"), Some(0));
        assert_eq!(parse_note_name(" B4 "), Some(71));
    }

    #[test]
    fn test_parse_note_name_rejects_garbage() {
        assert_eq!(parse_note_name(""), None);
        assert_eq!(parse_note_name("C"), None);
        assert_eq!(parse_note_name("H4"), None);
        assert_eq!(parse_note_name("C#"), None);
        assert_eq!(parse_note_name("# Format: [Note][Octave]"), None);
        assert_eq!(parse_note_name("C999999999"), None);
        assert_eq!(parse_note_name("Bb-999999999"), None);
    }
}
