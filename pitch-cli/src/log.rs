//! # Log Session Module
//!
//! Terminal and log-file reporting with an explicit `open -> write* -> close`
//! lifecycle. Event lines go to the terminal and straight to the logfile;
//! the per-tick note lines update a single terminal line in place and are
//! kept in a bounded ring that is flushed to the logfile on close, so a long
//! session cannot grow the file without bound.
//!
//! Writing after `close` is a programming error and fails fast.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, ensure};
use pitch_core::{TickOutcome, analysis::Reporter};

/// Maximum number of per-tick note lines retained for the logfile.
const NOTE_RING_CAPACITY: usize = 1000;

/// A terminal + logfile reporting session.
///
/// Created with [`open`](LogSession::open), fed through the
/// [`Reporter`] implementation or [`write_line`](LogSession::write_line),
/// and finished with [`close`](LogSession::close), which flushes the
/// retained note lines and seals the session.
pub struct LogSession {
    path: PathBuf,
    file: File,
    notes: VecDeque<String>,
    closed: bool,
}

impl LogSession {
    /// Opens a session writing to `log.txt` inside `savedir`.
    ///
    /// # Arguments
    /// * `savedir` - Existing directory for the logfile; an absent directory
    ///   is a configuration error, never silently substituted
    ///
    /// # Returns
    /// * `Ok(session)` - Open session with the start time stamped to file
    /// * `Err(e)` - Configuration or I/O error
    pub fn open(savedir: &Path) -> Result<Self> {
        ensure!(
            savedir.is_dir(),
            "Save directory does not exist: `{}`",
            savedir.display()
        );
        let path = savedir.join("log.txt");
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create logfile `{}`", path.display()))?;
        writeln!(file, "session opened at unix {}", unix_seconds())?;

        Ok(Self {
            path,
            file,
            notes: VecDeque::with_capacity(NOTE_RING_CAPACITY),
            closed: false,
        })
    }

    /// Writes an event line to the terminal and the logfile.
    ///
    /// # Panics
    /// * If the session has been closed; writing after close is a
    ///   programming error, not a silent no-op
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.assert_open();
        println!("{line}");
        writeln!(self.file, "{line}")?;
        Ok(())
    }

    /// Writes a continuously-updated note line, overwriting the current
    /// terminal line instead of scrolling. The line is retained in the
    /// bounded note ring and reaches the logfile on close.
    ///
    /// # Panics
    /// * If the session has been closed
    pub fn write_note(&mut self, line: &str) -> Result<()> {
        self.assert_open();
        print!("\r{line}");
        io::stdout().flush()?;

        if self.notes.len() == NOTE_RING_CAPACITY {
            self.notes.pop_front();
        }
        self.notes.push_back(line.to_string());
        Ok(())
    }

    /// Flushes the retained note lines to the logfile and seals the
    /// session. Any write after this fails fast.
    ///
    /// # Panics
    /// * If the session has already been closed
    pub fn close(&mut self) -> Result<()> {
        self.assert_open();
        println!();
        for note in &self.notes {
            writeln!(self.file, "{note}")?;
        }
        self.file.flush()?;
        self.closed = true;
        eprintln!("[LOG] Completed logging to `{}`", self.path.display());
        Ok(())
    }

    fn assert_open(&self) {
        assert!(
            !self.closed,
            "LogSession has been closed. No logging allowed."
        );
    }
}

impl Reporter for LogSession {
    fn ramp_up_complete(&mut self) -> Result<()> {
        self.write_line("Starting analysis!")
    }

    fn emit(&mut self, outcome: &TickOutcome) -> Result<()> {
        match outcome {
            TickOutcome::Pitch(result) => self.write_note(&format!(
                "Octave {}: {}  ",
                result.octave, result.pitch_class
            )),
            TickOutcome::NoPitch => self.write_note("Octave -: --  "),
        }
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitch_core::ClassificationResult;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pitch-cli-log-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_savedir_is_a_configuration_error() {
        let absent = std::env::temp_dir().join("pitch-cli-does-not-exist");
        assert!(LogSession::open(&absent).is_err());
    }

    #[test]
    fn notes_reach_the_logfile_on_close() {
        let dir = temp_dir("notes");
        let mut session = LogSession::open(&dir).unwrap();
        session.write_line("Starting analysis!").unwrap();
        session
            .emit(&TickOutcome::Pitch(ClassificationResult {
                pitch_class: "A",
                octave: 4,
                frequency: 440.0,
            }))
            .unwrap();
        session.emit(&TickOutcome::NoPitch).unwrap();
        session.close().unwrap();

        let contents = std::fs::read_to_string(dir.join("log.txt")).unwrap();
        assert!(contents.contains("Starting analysis!"));
        assert!(contents.contains("Octave 4: A"));
        assert!(contents.contains("Octave -: --"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn note_ring_is_bounded() {
        let dir = temp_dir("ring");
        let mut session = LogSession::open(&dir).unwrap();
        for i in 0..(NOTE_RING_CAPACITY + 10) {
            session.write_note(&format!("note {i}")).unwrap();
        }
        assert_eq!(session.notes.len(), NOTE_RING_CAPACITY);
        assert_eq!(session.notes.front().unwrap(), "note 10");
        session.close().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    #[should_panic(expected = "No logging allowed")]
    fn write_after_close_fails_fast() {
        let dir = temp_dir("closed");
        let mut session = LogSession::open(&dir).unwrap();
        session.close().unwrap();
        let _ = session.write_line("too late");
    }
}
