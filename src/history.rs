//! Transcription history as a JSONL file with a sliding window.
//!
//! Each line is one JSON object:
//!
//! ```json
//! {"timestamp":"2026-08-29T14:03:11-03:00","mode":"full","raw":"…","processed":"…","had_context":false}
//! ```
//!
//! Appends from concurrent pipeline tasks are serialized by a dedicated
//! writer lock so lines can never interleave or truncate each other.
//! History failures are logged and swallowed by the pipeline — they never
//! change a session's outcome.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::ProcessingMode;

// ---------------------------------------------------------------------------
// HistoryError
// ---------------------------------------------------------------------------

/// Errors while appending or reading history.  Never fatal to a session.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history entry could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// One completed session's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// RFC 3339 local timestamp.
    pub timestamp: String,
    /// Processing mode used for this session.
    pub mode: String,
    /// Transcript before processing.
    pub raw: String,
    /// Text actually delivered.
    pub processed: String,
    /// Whether a context snapshot was injected.
    pub had_context: bool,
}

impl HistoryEntry {
    /// Build an entry stamped with the current local time.
    pub fn now(mode: ProcessingMode, raw: &str, processed: &str, had_context: bool) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            mode: mode.as_str().to_string(),
            raw: raw.to_string(),
            processed: processed.to_string(),
            had_context,
        }
    }
}

// ---------------------------------------------------------------------------
// HistorySink
// ---------------------------------------------------------------------------

/// Capability the pipeline appends through.
pub trait HistorySink: Send + Sync {
    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError>;
}

// ---------------------------------------------------------------------------
// JsonlHistory
// ---------------------------------------------------------------------------

/// JSONL-backed history with sliding-window rotation.
pub struct JsonlHistory {
    path: PathBuf,
    max_entries: usize,
    enabled: bool,
    /// Guards the append + rotate sequence across concurrent writers.
    write_lock: Mutex<()>,
}

impl JsonlHistory {
    /// Create the logger, ensuring the parent directory exists.
    pub fn new(path: impl Into<PathBuf>, max_entries: usize, enabled: bool) -> Self {
        let path = path.into();
        if enabled {
            if let Some(parent) = path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    log::warn!("could not create history directory: {e}");
                }
            }
        }
        Self {
            path,
            max_entries,
            enabled,
            write_lock: Mutex::new(()),
        }
    }

    /// Return the newest `count` entries, newest first.
    ///
    /// Unparseable lines are skipped.
    pub fn recent(&self, count: usize) -> Vec<HistoryEntry> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };

        let mut entries: Vec<HistoryEntry> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();

        let start = entries.len().saturating_sub(count);
        let mut recent = entries.split_off(start);
        recent.reverse();
        recent
    }

    /// Remove the history file.
    pub fn clear(&self) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().unwrap();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Trim the file down to the newest `max_entries` lines.
    fn rotate_if_needed(&self, path: &Path) -> Result<(), HistoryError> {
        let content = fs::read_to_string(path)?;
        let lines: Vec<&str> = content.lines().collect();

        if lines.len() <= self.max_entries {
            return Ok(());
        }

        let keep = &lines[lines.len() - self.max_entries..];
        fs::write(path, keep.join("\n") + "\n")?;
        Ok(())
    }
}

impl HistorySink for JsonlHistory {
    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        if !self.enabled {
            return Ok(());
        }

        let line = serde_json::to_string(entry)?;

        let _guard = self.write_lock.lock().unwrap();

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // One write call per line keeps appends atomic for our own readers.
        file.write_all(format!("{line}\n").as_bytes())?;

        self.rotate_if_needed(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
