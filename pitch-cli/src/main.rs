//! # Pitch Detector CLI
//!
//! Terminal frontend for the streaming pitch detector. It wires the
//! microphone capture stream to the analysis loop and reports detected
//! notes on the terminal and to a logfile.
//!
//! ## Architecture
//! - **Main thread**: startup, operator input, ordered teardown
//! - **Capture**: CPAL's audio thread, pushing chunks over a channel
//! - **Analysis thread**: the analysis loop, selecting over chunks, its
//!   tick timer, and the shutdown channel
//! - **Communication**: crossbeam channels for thread-safe data exchange

mod log;

use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result, anyhow};
use cpal::traits::StreamTrait;
use pitch_core::analysis::{AnalysisConfig, AnalysisLoop};
use pitch_core::audio;
use serde::Deserialize;

use crate::log::LogSession;

/// Deployment configuration: the analysis parameters plus the capture and
/// reporting concerns that only the frontend cares about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    /// Core analysis parameters.
    #[serde(flatten)]
    analysis: AnalysisConfig,
    /// Input device name; the host default when absent.
    device: Option<String>,
    /// Directory for the logfile; the working directory when absent.
    log_dir: Option<PathBuf>,
}

/// Loads the configuration from the JSON file named on the command line, or
/// falls back to defaults when no path is given. A config file that exists
/// but does not parse is an error, never silently ignored.
fn load_config() -> Result<CliConfig> {
    match env::args().nth(1) {
        Some(path) => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("failed to open config file `{path}`"))?;
            serde_json::from_reader(file)
                .with_context(|| format!("failed to parse config file `{path}`"))
        }
        None => Ok(CliConfig::default()),
    }
}

fn main() -> Result<()> {
    eprintln!("[MAIN] Starting pitch detector...");
    let config = load_config()?;
    let mut analysis_config = config.analysis;
    analysis_config.validate()?;

    let savedir = match config.log_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let session = LogSession::open(&savedir)?;

    let (chunk_tx, chunk_rx) = crossbeam_channel::unbounded();
    let (stream, sample_rate) =
        audio::start_capture(chunk_tx, config.device.as_deref(), analysis_config.sample_rate)?;
    if sample_rate != analysis_config.sample_rate {
        eprintln!("[MAIN] Device negotiated {} Hz, adjusting analysis", sample_rate);
        analysis_config.sample_rate = sample_rate;
    }

    let mut analysis = AnalysisLoop::new(analysis_config)?;
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let analysis_thread = thread::spawn(move || -> Result<LogSession> {
        eprintln!("[ANALYSIS-THREAD] Starting analysis thread...");
        let mut session = session;
        analysis.run(chunk_rx, shutdown_rx, &mut session)?;
        eprintln!("[ANALYSIS-THREAD] Analysis thread finished");
        Ok(session)
    });

    eprintln!("[MAIN] Listening. Press Enter to stop.");
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);

    eprintln!("[MAIN] Shutting down...");
    let _ = shutdown_tx.send(());
    if let Err(e) = stream.pause() {
        eprintln!("[MAIN] Error pausing stream: {}", e);
    }
    drop(stream);

    let mut session = analysis_thread
        .join()
        .map_err(|_| anyhow!("analysis thread panicked"))??;
    session.close()?;
    eprintln!("[MAIN] Done");
    Ok(())
}
