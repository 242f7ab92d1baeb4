//! # Musical Notes Module
//!
//! This module provides the immutable pitch-class reference table and the
//! frequency-to-note classification used by the analysis loop. Classification
//! is a nearest-neighbor search in log-frequency space, so a measured
//! frequency does not have to match a table entry exactly.
//!
//! ## Features
//! - 12-entry pitch-class table (C to B), built once and never mutated
//! - Octave numbering anchored so that 440 Hz classifies as A4
//! - Robust to small measurement error in the input frequency

use once_cell::sync::Lazy;

use crate::ClassificationResult;

/// A single pitch class with its reference frequency stored as log2(Hz).
#[derive(Debug, Clone, Copy)]
pub struct NoteEntry {
    /// Pitch-class name (e.g., "C#", "A")
    pub name: &'static str,
    /// log2 of the octave-0 reference frequency in Hz
    pub log2_frequency: f32,
}

/// Octave-0 reference frequencies in Hz for the 12 pitch classes.
const REFERENCE_HZ: [(&str, f32); 12] = [
    ("C", 16.35),
    ("C#", 17.32),
    ("D", 18.35),
    ("D#", 19.45),
    ("E", 20.60),
    ("F", 21.83),
    ("F#", 23.12),
    ("G", 24.50),
    ("G#", 25.96),
    ("A", 27.50),
    ("A#", 29.14),
    ("B", 30.87),
];

/// Lowest representable musical pitch in Hz (octave-0 C). Candidates below
/// this cannot be classified and are discarded by the spectral extractor.
pub const LOWEST_PITCH_HZ: f32 = REFERENCE_HZ[0].1;

/// Statically computed pitch-class table.
///
/// Computed once at first use and immutable afterwards, so classification
/// results can never be affected by reordering or accidental mutation.
static NOTE_TABLE: Lazy<[NoteEntry; 12]> = Lazy::new(|| {
    REFERENCE_HZ.map(|(name, hz)| NoteEntry {
        name,
        log2_frequency: hz.log2(),
    })
});

/// Calibration constant for octave numbering: the log2-frequency at the
/// center of octave 0, i.e., the table's lowest entry offset by half the
/// C-to-B span. Anchors 440 Hz to octave 4.
static MIDDLE: Lazy<f32> = Lazy::new(|| {
    let c = NOTE_TABLE[0].log2_frequency;
    let b = NOTE_TABLE[11].log2_frequency;
    c + (b - c) / 2.0
});

/// Classifies a frequency as a pitch class and octave.
///
/// The octave estimate is `round(log2(f) - MIDDLE)`; the pitch class is the
/// table entry whose octave-adjusted log distance comes closest to that
/// integer. Doubling or halving the input shifts the octave by exactly one
/// and leaves the pitch class unchanged.
///
/// # Arguments
/// * `frequency` - Measured frequency in Hz
///
/// # Returns
/// * `ClassificationResult` - Pitch class, octave, and the input frequency
///
/// # Panics
/// * If `frequency` is non-positive or not finite; feeding such a value is
///   a bookkeeping error in the caller, not a recoverable condition
pub fn classify(frequency: f32) -> ClassificationResult {
    assert!(
        frequency.is_finite() && frequency > 0.0,
        "frequency must be a positive number of Hz, got {frequency}"
    );

    let log_f = frequency.log2();
    let octave = (log_f - *MIDDLE).round() as i32;

    let entry = NOTE_TABLE
        .iter()
        .min_by(|a, b| {
            let score_a = (octave as f32 - (log_f - a.log2_frequency)).abs();
            let score_b = (octave as f32 - (log_f - b.log2_frequency)).abs();
            score_a.partial_cmp(&score_b).unwrap()
        })
        .unwrap(); // This is safe as NOTE_TABLE is never empty.

    ClassificationResult {
        pitch_class: entry.name,
        octave,
        frequency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concert_pitch_is_a4() {
        let result = classify(440.0);
        assert_eq!(result.pitch_class, "A");
        assert_eq!(result.octave, 4);
    }

    #[test]
    fn octave_steps_with_concert_pitch_multiples() {
        for (frequency, octave) in [
            (110.0, 2),
            (220.0, 3),
            (440.0, 4),
            (880.0, 5),
            (1760.0, 6),
        ] {
            let result = classify(frequency);
            assert_eq!(result.pitch_class, "A", "at {frequency} Hz");
            assert_eq!(result.octave, octave, "at {frequency} Hz");
        }
    }

    #[test]
    fn doubling_shifts_octave_only() {
        let low = classify(261.63); // C4
        let high = classify(523.26);
        assert_eq!(low.pitch_class, "C");
        assert_eq!(high.pitch_class, low.pitch_class);
        assert_eq!(high.octave, low.octave + 1);
    }

    #[test]
    fn tolerates_small_measurement_error() {
        let result = classify(441.3);
        assert_eq!(result.pitch_class, "A");
        assert_eq!(result.octave, 4);
    }

    #[test]
    #[should_panic(expected = "must be a positive number")]
    fn zero_frequency_is_a_contract_violation() {
        let _ = classify(0.0);
    }

    #[test]
    #[should_panic(expected = "must be a positive number")]
    fn negative_frequency_is_a_contract_violation() {
        let _ = classify(-27.5);
    }
}
