//! # Spectral Extraction Module
//!
//! This module turns a raw sample window into a ranked list of candidate
//! fundamental frequencies. It estimates the one-sided power spectral
//! density of the window (periodogram method) and picks the spectral peaks
//! that stand out against the average level of the whole spectrum.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once at construction
//! - Hann windowing for reduced spectral leakage
//! - DC offset removal for accurate analysis
//! - Documented peak prominence rule: a bin is a peak only if it is strictly
//!   above both neighbors and above a mean-relative height floor, which
//!   keeps neighboring-bin duplicates out of the candidate list

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, ensure};
use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::notes;

/// A candidate fundamental frequency found in one analysis window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchCandidate {
    /// Bin-center frequency in Hz, rounded to 2 decimal places
    pub frequency: f32,
    /// Peak height in the power spectral density
    pub strength: f32,
}

/// Windowed spectral pitch extractor.
///
/// Holds the FFT plan and the Hann window coefficients for a fixed window
/// size, so per-tick extraction does not re-plan.
pub struct SpectralExtractor {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    window_size: usize,
    sample_rate: u32,
    sensitivity_threshold: f32,
    /// Periodogram normalization: 1 / (sample_rate * sum of squared window
    /// coefficients).
    psd_scale: f32,
}

impl SpectralExtractor {
    /// Creates an extractor for windows of exactly `window_size` samples.
    ///
    /// # Arguments
    /// * `window_size` - Samples per analysis window, must be non-zero
    /// * `sample_rate` - Sample rate in Hz, must be non-zero
    /// * `sensitivity_threshold` - Multiplier of the average spectral
    ///   density that a peak must exceed; must be finite and positive
    ///
    /// # Returns
    /// * `Ok(extractor)` - Ready-to-use extractor with a planned FFT
    /// * `Err(e)` - Configuration error for any invalid parameter
    pub fn new(window_size: usize, sample_rate: u32, sensitivity_threshold: f32) -> Result<Self> {
        ensure!(window_size > 0, "window size must be non-zero");
        ensure!(sample_rate > 0, "sample rate must be non-zero");
        ensure!(
            sensitivity_threshold.is_finite() && sensitivity_threshold > 0.0,
            "sensitivity threshold must be finite and positive, got {sensitivity_threshold}"
        );

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        let hann = hann_window(window_size);
        let window_energy: f32 = hann.iter().map(|w| w * w).sum();

        Ok(Self {
            fft,
            hann,
            window_size,
            sample_rate,
            sensitivity_threshold,
            psd_scale: 1.0 / (sample_rate as f32 * window_energy),
        })
    }

    /// Frequency resolution of the analysis in Hz per bin.
    pub fn resolution(&self) -> f32 {
        self.sample_rate as f32 / self.window_size as f32
    }

    /// Extracts candidate fundamental frequencies from one window.
    ///
    /// Candidates are ordered by decreasing strength, deduplicated by their
    /// rounded frequency (strongest kept), and anything below the lowest
    /// representable musical pitch is discarded. An empty result means the
    /// window had no clear tonal content; that is a normal outcome, not an
    /// error.
    ///
    /// # Arguments
    /// * `window` - Mono samples, must be exactly the configured window size
    ///
    /// # Panics
    /// * If `window.len()` differs from the configured window size; handing
    ///   over a partial window is a bookkeeping error in the caller
    pub fn extract(&self, window: &[f32]) -> Vec<PitchCandidate> {
        assert!(
            window.len() == self.window_size,
            "analysis window must be exactly {} samples, got {}",
            self.window_size,
            window.len()
        );

        let psd = self.power_spectral_density(window);
        let mean = psd.iter().sum::<f32>() / psd.len() as f32;
        let height_floor = self.sensitivity_threshold * mean;
        let resolution = self.resolution();

        let mut candidates: Vec<PitchCandidate> = Vec::new();
        for bin in 1..psd.len().saturating_sub(1) {
            let height = psd[bin];
            if height > psd[bin - 1] && height > psd[bin + 1] && height > height_floor {
                let frequency = round_hundredths(bin as f32 * resolution);
                if frequency >= notes::LOWEST_PITCH_HZ {
                    candidates.push(PitchCandidate {
                        frequency,
                        strength: height,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Keep the strongest candidate per rounded frequency.
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert((c.frequency * 100.0).round() as i64));
        candidates
    }

    /// One-sided power spectral density of `window` via the periodogram
    /// method: DC removal, Hann windowing, forward FFT, then squared
    /// magnitudes scaled so that interior bins carry the energy of both
    /// spectral halves.
    fn power_spectral_density(&self, window: &[f32]) -> Vec<f32> {
        let mut processed = window.to_vec();
        remove_dc_offset(&mut processed);

        let mut buffer: Vec<Complex<f32>> = processed
            .iter()
            .zip(self.hann.iter())
            .map(|(&sample, &w)| Complex {
                re: sample * w,
                im: 0.0,
            })
            .collect();
        self.fft.process(&mut buffer);

        let bins = self.window_size / 2 + 1;
        let nyquist_bin = if self.window_size % 2 == 0 {
            Some(self.window_size / 2)
        } else {
            None
        };

        buffer
            .iter()
            .take(bins)
            .enumerate()
            .map(|(bin, c)| {
                let mut power = c.norm_sqr() * self.psd_scale;
                // DC and Nyquist have no mirrored half to fold in.
                if bin != 0 && Some(bin) != nyquist_bin {
                    power *= 2.0;
                }
                power
            })
            .collect()
    }
}

/// Removes the DC offset from a signal by making its average value zero.
/// A nonzero mean would otherwise leak a large component into the lowest
/// bins and distort the mean-relative height floor.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Hann window coefficients for a window of `n` samples.
fn hann_window(n: usize) -> Vec<f32> {
    if n == 1 {
        return vec![1.0];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Rounds a frequency to 2 decimal places.
fn round_hundredths(frequency: f32) -> f32 {
    (frequency * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let count = (seconds * sample_rate as f32) as usize;
        (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(SpectralExtractor::new(0, 44100, 50.0).is_err());
        assert!(SpectralExtractor::new(1024, 0, 50.0).is_err());
        assert!(SpectralExtractor::new(1024, 44100, 0.0).is_err());
        assert!(SpectralExtractor::new(1024, 44100, f32::NAN).is_err());
    }

    #[test]
    fn pure_sine_peaks_at_its_frequency() {
        let extractor = SpectralExtractor::new(44100, 44100, 50.0).unwrap();
        let window = sine(440.0, 1.0, 1.0, 44100);
        let candidates = extractor.extract(&window);
        assert!(!candidates.is_empty());
        assert!((candidates[0].frequency - 440.0).abs() <= extractor.resolution());
    }

    #[test]
    fn stronger_tone_ranks_first() {
        let extractor = SpectralExtractor::new(44100, 44100, 50.0).unwrap();
        let mut window = sine(440.0, 1.0, 1.0, 44100);
        for (sample, quiet) in window.iter_mut().zip(sine(660.0, 0.4, 1.0, 44100)) {
            *sample += quiet;
        }
        let candidates = extractor.extract(&window);
        assert!(candidates.len() >= 2);
        assert!((candidates[0].frequency - 440.0).abs() <= extractor.resolution());
        assert!((candidates[1].frequency - 660.0).abs() <= extractor.resolution());
        assert!(candidates[0].strength > candidates[1].strength);
    }

    #[test]
    fn silence_yields_no_candidates() {
        let extractor = SpectralExtractor::new(4096, 44100, 50.0).unwrap();
        let candidates = extractor.extract(&vec![0.0; 4096]);
        assert!(candidates.is_empty());
    }

    #[test]
    fn constant_signal_yields_no_candidates() {
        let extractor = SpectralExtractor::new(4096, 44100, 50.0).unwrap();
        let candidates = extractor.extract(&vec![0.7; 4096]);
        assert!(candidates.is_empty());
    }

    #[test]
    fn subsonic_tone_is_discarded() {
        let extractor = SpectralExtractor::new(44100, 44100, 50.0).unwrap();
        let window = sine(10.0, 1.0, 1.0, 44100);
        assert!(extractor.extract(&window).is_empty());
    }

    #[test]
    #[should_panic(expected = "must be exactly")]
    fn partial_window_is_a_contract_violation() {
        let extractor = SpectralExtractor::new(4096, 44100, 50.0).unwrap();
        let _ = extractor.extract(&vec![0.0; 1024]);
    }
}
