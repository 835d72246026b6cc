//! Session recording and tabular export
//!
//! This module accumulates one [`SessionLogEntry`] per processed frame and
//! serializes the ordered log to CSV at session end. The destination comes
//! from a [`SavePrompt`] capability so the core stays testable without any
//! file-picker UI; declining the prompt discards the log.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

use crate::error::MonitorError;
use crate::types::SessionLogEntry;

/// CSV header, fixed column order
pub const CSV_HEADER: [&str; 5] = [
    "Unix Timestamp",
    "Video Timestamp",
    "Posture",
    "Angle",
    "Confidence",
];

/// What a save destination is being requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveTarget {
    /// Rendered video output (chosen at startup)
    Video,
    /// Tabular session data (chosen at shutdown)
    Data,
}

/// Capability for asking the user where to persist session artifacts.
///
/// `None` means the user declined and the artifact is discarded.
pub trait SavePrompt {
    fn request_save_path(&self, target: SaveTarget) -> Option<PathBuf>;
}

/// Prompt that always declines; useful for headless runs
pub struct NoPrompt;

impl SavePrompt for NoPrompt {
    fn request_save_path(&self, _target: SaveTarget) -> Option<PathBuf> {
        None
    }
}

/// Prompt answered up front with fixed paths (CLI flags, tests)
#[derive(Debug, Clone, Default)]
pub struct FixedPaths {
    paths: HashMap<SaveTarget, PathBuf>,
}

impl FixedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, target: SaveTarget, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(target, path.into());
        self
    }
}

impl SavePrompt for FixedPaths {
    fn request_save_path(&self, target: SaveTarget) -> Option<PathBuf> {
        self.paths.get(&target).cloned()
    }
}

/// Append-only in-memory log of a monitoring session
#[derive(Debug, Default)]
pub struct SessionRecorder {
    entries: Vec<SessionLogEntry>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one frame's entry; order is capture order
    pub fn record(&mut self, entry: SessionLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[SessionLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the full ordered log as CSV.
    ///
    /// Angle and confidence are rounded to two decimals; absent values are
    /// written as "N/A".
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(CSV_HEADER)?;
        for entry in &self.entries {
            csv_writer.write_record([
                format!("{:.3}", entry.unix_timestamp),
                entry.elapsed.clone(),
                entry.status.as_str().to_string(),
                format_measurement(entry.angle),
                format_measurement(entry.confidence),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the CSV export to `path`
    pub fn save(&self, path: &Path) -> Result<(), MonitorError> {
        let file = File::create(path)?;
        self.write_csv(file)?;
        info!(target: "data", "session data saved to {}", path.display());
        Ok(())
    }

    /// Ask the prompt for a destination and export there.
    ///
    /// Returns the path written, or `None` when the user declined.
    pub fn save_with_prompt(
        &self,
        prompt: &dyn SavePrompt,
    ) -> Result<Option<PathBuf>, MonitorError> {
        match prompt.request_save_path(SaveTarget::Data) {
            Some(path) => {
                self.save(&path)?;
                Ok(Some(path))
            }
            None => {
                info!(target: "data", "session data save declined, log discarded");
                Ok(None)
            }
        }
    }
}

fn format_measurement(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "N/A".to_string(),
    }
}

/// Format elapsed session time as HH:MM:SS.mmm
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let millis = elapsed.subsec_millis();
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
