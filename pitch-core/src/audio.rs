//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform
//! Audio Library). It provides functions for selecting an input device,
//! configuring the stream, and pushing captured chunks to the analysis
//! pipeline.
//!
//! ## Features
//! - Default-device capture or explicit device selection by name
//! - Configurable sample rate, nearest supported rate is negotiated
//! - Fixed-size chunk delivery over a channel, never blocking the callback
//! - Fail-fast configuration errors for absent devices or formats

use anyhow::{Result, anyhow, ensure};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Number of samples per chunk delivered to the analysis pipeline.
///
/// Larger chunks mean fewer channel sends but more latency between capture
/// and analysis (~46ms at 44.1kHz with the current value).
pub const CHUNK_SIZE: usize = 2048;

/// Starts audio capture and streams fixed-size chunks to `sender`.
///
/// This function:
/// 1. Selects the default input device, or the named one if given
/// 2. Negotiates a mono f32 stream near the requested sample rate
/// 3. Installs a callback that accumulates hardware deliveries and forwards
///    `CHUNK_SIZE`-sample chunks without ever blocking
///
/// The callback side performs no analysis and holds no locks; a chunk that
/// cannot be sent because the consumer is gone is dropped silently, which is
/// the consumer's cue to tear everything down.
///
/// # Arguments
/// * `sender` - Channel sender for streaming chunks to the analysis thread
/// * `device_name` - Input device to capture from; `None` selects the
///   host default. A name matching no device is a configuration error.
/// * `sample_rate` - Requested sample rate in Hz
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Live stream handle and the sample rate
///   actually negotiated with the device
/// * `Err(e)` - Configuration error if no device or format fits
pub fn start_capture(
    sender: Sender<Vec<f32>>,
    device_name: Option<&str>,
    sample_rate: u32,
) -> Result<(cpal::Stream, u32)> {
    ensure!(sample_rate > 0, "sample rate must be non-zero");

    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow!("Requested input device not found: `{name}`"))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?,
    };

    eprintln!("[AUDIO] Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, sample_rate)
        .ok_or_else(|| anyhow!("No suitable mono f32 input format found"))?;

    let negotiated = cpal::SampleRate(sample_rate).clamp(
        supported_config.min_sample_rate(),
        supported_config.max_sample_rate(),
    );
    let config = supported_config.with_sample_rate(negotiated);

    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    eprintln!("[AUDIO] Selected sample rate: {} Hz", sample_rate_val);

    let err_fn = |err| eprintln!("[AUDIO] An error occurred on the audio stream: {}", err);

    // This buffer accumulates hardware deliveries between chunk sends.
    let mut pending = Vec::with_capacity(CHUNK_SIZE * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            pending.extend_from_slice(data);

            // While we have enough data for a full chunk, forward it.
            while pending.len() >= CHUNK_SIZE {
                let chunk = pending[..CHUNK_SIZE].to_vec();

                // Send the chunk, ignoring errors if the consumer is gone.
                let _ = sender.try_send(chunk);

                pending.drain(..CHUNK_SIZE);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Filters for mono f32 configurations and picks the one whose supported
/// rate range comes closest to the target.
///
/// # Arguments
/// * `configs` - List of supported audio configurations from the device
/// * `target_rate` - Desired sample rate in Hz
///
/// # Returns
/// * `Some(config)` - Best matching configuration
/// * `None` - No suitable configuration found
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
