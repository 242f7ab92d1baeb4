//! # Analysis Loop Module
//!
//! This module orchestrates the consumer side of the pipeline: it owns the
//! circular buffer, drains captured chunks into it, waits out the ramp-up
//! period, and then periodically snapshots a window, extracts candidate
//! pitches, classifies the strongest one, and hands the outcome to a
//! reporter.
//!
//! ## Architecture
//! - **Producer**: the capture callback, which only sends chunks over a
//!   channel and never blocks
//! - **Consumer**: [`AnalysisLoop::run`], a dedicated thread selecting over
//!   the chunk channel, a tick timer, and a shutdown channel
//! - Appends never wait on analysis and analysis never delays appends; the
//!   buffer itself is touched by the consumer thread only

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::buffer::CircularAudioBuffer;
use crate::spectrum::SpectralExtractor;
use crate::{ClassificationResult, TickOutcome, notes};

/// Configuration for the analysis loop.
///
/// Deserializable so deployments can ship it as a JSON file; every field
/// falls back to its default when omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Samples analyzed per tick.
    pub window_size: usize,
    /// Peak detection multiplier over the average spectral density.
    pub sensitivity_threshold: f32,
    /// Ramp-up poll period and steady-state analysis cadence, in
    /// milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            window_size: 44100,
            sensitivity_threshold: 50.0,
            poll_interval_ms: 500,
        }
    }
}

impl AnalysisConfig {
    /// Validates the configuration, failing fast on anything a later stage
    /// would silently misbehave on.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.sample_rate > 0, "sample_rate must be non-zero");
        anyhow::ensure!(self.window_size > 0, "window_size must be non-zero");
        anyhow::ensure!(
            self.sensitivity_threshold.is_finite() && self.sensitivity_threshold > 0.0,
            "sensitivity_threshold must be finite and positive"
        );
        anyhow::ensure!(self.poll_interval_ms > 0, "poll_interval_ms must be non-zero");
        Ok(())
    }

    /// Ramp-up poll period and analysis cadence.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Ring capacity derived from the configuration: always at least one
    /// analysis window and at least one second of audio.
    pub fn buffer_capacity(&self) -> usize {
        self.window_size.max(self.sample_rate as usize)
    }
}

/// Sink for per-tick analysis outcomes.
///
/// Implementations decide display and persistence mechanics; the loop only
/// assumes that `emit` returns well within one tick interval.
pub trait Reporter {
    /// Called exactly once, when the buffer first holds a full window.
    fn ramp_up_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once per analysis tick with the classification outcome.
    fn emit(&mut self, outcome: &TickOutcome) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LoopState {
    /// Buffer does not yet hold a full window; ticks only poll readiness.
    RampingUp,
    /// Every tick snapshots, extracts, classifies, and reports.
    Analyzing,
}

/// The periodic analysis state machine.
pub struct AnalysisLoop {
    config: AnalysisConfig,
    buffer: CircularAudioBuffer,
    extractor: SpectralExtractor,
    state: LoopState,
}

impl AnalysisLoop {
    /// Builds the loop from a validated configuration.
    ///
    /// # Arguments
    /// * `config` - Analysis configuration, validated here before any
    ///   resources are allocated
    ///
    /// # Returns
    /// * `Ok(loop)` - Loop in the ramping-up state with an empty buffer
    /// * `Err(e)` - Configuration error, surfaced to the caller untouched
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let buffer = CircularAudioBuffer::new(config.buffer_capacity())?;
        let extractor = SpectralExtractor::new(
            config.window_size,
            config.sample_rate,
            config.sensitivity_threshold,
        )?;
        Ok(Self {
            config,
            buffer,
            extractor,
            state: LoopState::RampingUp,
        })
    }

    /// Appends one captured chunk to the buffer. Producer-cadence primitive
    /// used by [`run`](AnalysisLoop::run); never blocks.
    pub fn ingest(&mut self, chunk: &[f32]) {
        self.buffer.append(chunk);
    }

    /// Performs one tick of the state machine.
    ///
    /// During ramp-up this only polls buffer readiness; the first ready tick
    /// logs the transition, notifies the reporter, and analyzes immediately.
    /// Afterwards every tick analyzes the latest window and emits either a
    /// classification or an explicit no-pitch marker.
    pub fn tick(&mut self, reporter: &mut dyn Reporter) -> Result<()> {
        match self.state {
            LoopState::RampingUp => {
                if self.buffer.is_ready(self.config.window_size) {
                    eprintln!("[ANALYSIS] Ramp-up complete, starting analysis");
                    reporter.ramp_up_complete()?;
                    self.state = LoopState::Analyzing;
                    self.analyze(reporter)?;
                }
            }
            LoopState::Analyzing => self.analyze(reporter)?,
        }
        Ok(())
    }

    /// Runs the consumer loop until shutdown.
    ///
    /// Selects over the producer's chunk channel (drained into the buffer as
    /// chunks arrive), a tick timer at the configured poll interval, and the
    /// shutdown channel. A disconnected chunk channel means the audio source
    /// failed or was torn down; the loop keeps its last-known buffer state
    /// and returns without retrying, leaving recovery to the caller.
    ///
    /// # Arguments
    /// * `chunks` - Channel delivering captured sample chunks
    /// * `shutdown` - Channel signalling process teardown
    /// * `reporter` - Sink for per-tick outcomes
    pub fn run(
        &mut self,
        chunks: crossbeam_channel::Receiver<Vec<f32>>,
        shutdown: crossbeam_channel::Receiver<()>,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let ticker = crossbeam_channel::tick(self.config.poll_interval());
        loop {
            crossbeam_channel::select! {
                recv(chunks) -> msg => match msg {
                    Ok(chunk) => self.ingest(&chunk),
                    Err(_) => {
                        eprintln!("[ANALYSIS] Audio channel closed, stopping");
                        break;
                    }
                },
                recv(ticker) -> _ => self.tick(reporter)?,
                recv(shutdown) -> _ => {
                    eprintln!("[ANALYSIS] Received shutdown signal");
                    break;
                }
            }
        }
        Ok(())
    }

    fn analyze(&mut self, reporter: &mut dyn Reporter) -> Result<()> {
        let window = self.buffer.snapshot(self.config.window_size);
        let candidates = self.extractor.extract(&window);
        let outcome = match candidates.first() {
            Some(strongest) => {
                let result: ClassificationResult = notes::classify(strongest.frequency);
                TickOutcome::Pitch(result)
            }
            None => TickOutcome::NoPitch,
        };
        reporter.emit(&outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectingReporter {
        ready_events: usize,
        outcomes: Vec<TickOutcome>,
    }

    impl Reporter for CollectingReporter {
        fn ramp_up_complete(&mut self) -> Result<()> {
            self.ready_events += 1;
            Ok(())
        }

        fn emit(&mut self, outcome: &TickOutcome) -> Result<()> {
            self.outcomes.push(outcome.clone());
            Ok(())
        }
    }

    fn small_config() -> AnalysisConfig {
        AnalysisConfig {
            sample_rate: 8192,
            window_size: 4096,
            sensitivity_threshold: 50.0,
            poll_interval_ms: 100,
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        for config in [
            AnalysisConfig {
                sample_rate: 0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                window_size: 0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                sensitivity_threshold: -1.0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                poll_interval_ms: 0,
                ..AnalysisConfig::default()
            },
        ] {
            assert!(AnalysisLoop::new(config).is_err());
        }
    }

    #[test]
    fn stays_ramping_up_without_enough_data() {
        let mut analysis = AnalysisLoop::new(small_config()).unwrap();
        let mut reporter = CollectingReporter::default();

        analysis.ingest(&vec![0.0; 1024]);
        for _ in 0..3 {
            analysis.tick(&mut reporter).unwrap();
        }

        assert_eq!(reporter.ready_events, 0);
        assert!(reporter.outcomes.is_empty());
    }

    #[test]
    fn reports_ready_exactly_once() {
        let mut analysis = AnalysisLoop::new(small_config()).unwrap();
        let mut reporter = CollectingReporter::default();

        analysis.ingest(&vec![0.0; 8192]);
        for _ in 0..4 {
            analysis.tick(&mut reporter).unwrap();
        }

        assert_eq!(reporter.ready_events, 1);
        assert_eq!(reporter.outcomes.len(), 4);
    }

    #[test]
    fn silence_reports_no_pitch() {
        let mut analysis = AnalysisLoop::new(small_config()).unwrap();
        let mut reporter = CollectingReporter::default();

        analysis.ingest(&vec![0.0; 8192]);
        analysis.tick(&mut reporter).unwrap();

        assert_eq!(reporter.outcomes, vec![TickOutcome::NoPitch]);
    }
}
