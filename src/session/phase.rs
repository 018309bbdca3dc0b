//! Session phase enumeration.
//!
//! [`Phase`] is the single observable state of the orchestrator.  The state
//! machine transitions are:
//!
//! ```text
//! Idle ──activate────▶ Recording
//!      ──deactivate──▶ Processing
//!                      ──pipeline ok───▶ Ready ──linger──▶ Idle
//!                      ──pipeline err──▶ Error ──linger──▶ Idle
//!                      ──empty result──▶ Idle   (no Ready/Error shown)
//! ```
//!
//! `Idle` is both the initial state and the terminal-reentry state; no
//! session exists while `Idle` is displayed.

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Observable phases of a dictation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the user to trigger the activation chord.
    Idle,

    /// Microphone is capturing; a session is open.
    Recording,

    /// Capture has ended; transcription/processing runs in the background.
    Processing,

    /// The final text has been delivered.  Held briefly, then back to `Idle`.
    Ready,

    /// A pipeline stage failed.  Held briefly, then back to `Idle`.
    Error,
}

impl Phase {
    /// A short human-readable label for logs and observer displays.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Recording => "recording",
            Phase::Processing => "processing",
            Phase::Ready => "ready",
            Phase::Error => "error",
        }
    }

    /// Returns `true` for the two linger phases that auto-clear to `Idle`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Error)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phase_is_idle() {
        assert_eq!(Phase::default(), Phase::Idle);
    }

    #[test]
    fn labels() {
        assert_eq!(Phase::Idle.label(), "idle");
        assert_eq!(Phase::Recording.label(), "recording");
        assert_eq!(Phase::Processing.label(), "processing");
        assert_eq!(Phase::Ready.label(), "ready");
        assert_eq!(Phase::Error.label(), "error");
    }

    #[test]
    fn only_ready_and_error_are_terminal() {
        assert!(Phase::Ready.is_terminal());
        assert!(Phase::Error.is_terminal());
        assert!(!Phase::Idle.is_terminal());
        assert!(!Phase::Recording.is_terminal());
        assert!(!Phase::Processing.is_terminal());
    }
}
