//! Per-session processing pipeline: transcribe → process → record → deliver.
//!
//! The controller hands each closed capture to the pipeline as a
//! [`SessionJob`]; [`PipelineRunner`] runs every job in its own tokio task so
//! the edge loop can accept the next activation immediately.

pub mod runner;

use std::time::Duration;

use crate::session::ProcessingMode;

pub use runner::PipelineRunner;

/// How long the `Ready` phase is displayed before returning to `Idle`.
pub const READY_LINGER: Duration = Duration::from_secs(1);

/// How long the `Error` phase is displayed before returning to `Idle`.
pub const ERROR_LINGER: Duration = Duration::from_secs(2);

/// Context snapshots are truncated to this many characters before being
/// embedded in the processing prompt.
pub const CONTEXT_MAX_CHARS: usize = 2000;

// ---------------------------------------------------------------------------
// SessionJob
// ---------------------------------------------------------------------------

/// Everything the pipeline needs to finish one session.
///
/// Built by the controller at hand-off; the mode and context snapshot are
/// frozen here, so later cycling or clipboard changes cannot affect the job.
#[derive(Debug)]
pub struct SessionJob {
    /// Session id, for phase ownership and logging.
    pub id: u64,
    /// Captured audio, WAV-encoded.
    pub audio: Vec<u8>,
    /// Clipboard snapshot from activation (context sessions only).
    pub context: Option<String>,
    /// Processing mode read at hand-off.
    pub mode: ProcessingMode,
}

// ---------------------------------------------------------------------------
// SessionPipeline
// ---------------------------------------------------------------------------

/// Seam between the controller and the pipeline, mockable in tests.
pub trait SessionPipeline: Send + Sync {
    /// Start processing `job` in the background.  Must not block.
    fn spawn(&self, job: SessionJob);
}
