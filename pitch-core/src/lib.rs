// pitch-core/src/lib.rs

//! The core logic for the streaming pitch detector.
//! This crate is responsible for audio capture, buffering, spectral pitch
//! extraction, and musical note classification. It is completely headless
//! and contains no terminal code.

pub mod analysis;
pub mod audio;
pub mod buffer;
pub mod notes;
pub mod spectrum;

/// The note classification produced by a single analysis tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// Pitch-class name (one of the 12 semitone categories, "C" to "B").
    pub pitch_class: &'static str,
    /// Octave index; octave 4 contains concert pitch A = 440 Hz.
    pub octave: i32,
    /// The frequency in Hz that was classified.
    pub frequency: f32,
}

/// Outcome of one analysis tick, consumed immediately by the reporter.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A dominant pitch was found in the window.
    Pitch(ClassificationResult),
    /// No peak cleared the sensitivity threshold; a normal outcome for
    /// silence or untuned noise, not an error.
    NoPitch,
}
