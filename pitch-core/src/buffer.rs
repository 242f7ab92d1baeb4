//! # Circular Audio Buffer Module
//!
//! This module provides the fixed-capacity sample buffer that sits between
//! the audio capture callback and the analysis loop. The capture side keeps
//! appending small chunks at its own cadence while the analysis side
//! periodically copies out the most recent window of samples.
//!
//! ## Features
//! - Fixed pre-allocated storage, no reallocation after construction
//! - Append-and-overwrite only, oldest samples are silently replaced
//! - Saturating ramp-up counter to detect when one full window is available
//! - Copy-out snapshots, internal storage is never exposed by reference

use anyhow::{Result, ensure};

/// Fixed-capacity ring buffer for mono f32 samples.
///
/// The buffer owns its backing storage outright. Writers go through
/// [`append`](CircularAudioBuffer::append) and readers only ever receive
/// owned copies from [`snapshot`](CircularAudioBuffer::snapshot), so no
/// caller can hold a reference into the ring while it is being overwritten.
#[derive(Debug)]
pub struct CircularAudioBuffer {
    data: Box<[f32]>,
    write_pos: usize,
    /// Samples ever written, saturating at the capacity. Only used as the
    /// ramp-up flag, never for indexing.
    total_written: usize,
}

impl CircularAudioBuffer {
    /// Creates a buffer holding exactly `capacity` samples.
    ///
    /// # Arguments
    /// * `capacity` - Ring size in samples, must be non-zero
    ///
    /// # Returns
    /// * `Ok(buffer)` - Empty buffer, write cursor at zero
    /// * `Err(e)` - Configuration error if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self> {
        ensure!(capacity > 0, "buffer capacity must be non-zero");
        Ok(Self {
            data: vec![0.0; capacity].into_boxed_slice(),
            write_pos: 0,
            total_written: 0,
        })
    }

    /// Ring capacity in samples.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Appends `chunk` at the write cursor, wrapping modulo the capacity.
    ///
    /// Chunks of any length are accepted, including chunks longer than the
    /// capacity, which simply wrap multiple times and end up equivalent to
    /// appending the chunk in capacity-sized pieces. Never blocks and never
    /// allocates.
    ///
    /// # Arguments
    /// * `chunk` - Mono samples in chronological order
    pub fn append(&mut self, chunk: &[f32]) {
        let n = self.data.len();
        for &sample in chunk {
            self.data[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % n;
        }
        self.total_written = self.total_written.saturating_add(chunk.len()).min(n);
    }

    /// Returns true once at least `window_size` samples have ever been
    /// written. Monotonic for a fixed `window_size`: once true, true forever.
    pub fn is_ready(&self, window_size: usize) -> bool {
        self.total_written >= window_size
    }

    /// Copies out the last `window_size` samples in chronological order
    /// (oldest first).
    ///
    /// The read start is derived from the write cursor at call time, so the
    /// returned window always ends at the most recently appended sample,
    /// including when the window spans the wrap-around boundary. Read-only
    /// with respect to buffer state: calling twice without an intervening
    /// `append` returns identical results.
    ///
    /// # Arguments
    /// * `window_size` - Number of samples to copy, at most the capacity
    ///
    /// # Panics
    /// * If `window_size` exceeds the capacity
    /// * If called before `is_ready(window_size)`; both are bookkeeping
    ///   errors in the caller, not recoverable conditions
    pub fn snapshot(&self, window_size: usize) -> Vec<f32> {
        let n = self.data.len();
        assert!(
            window_size <= n,
            "snapshot of {window_size} samples exceeds buffer capacity {n}"
        );
        assert!(
            self.is_ready(window_size),
            "snapshot of {window_size} samples requested before ramp-up completed"
        );

        let start = (self.write_pos + n - window_size) % n;
        let mut out = vec![0.0; window_size];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.data[(start + i) % n];
        }
        out
    }
}
