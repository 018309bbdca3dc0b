//! Processing mode registry.
//!
//! The four modes form a fixed cycle `raw → clean → tech → full → raw`,
//! advanced one step per cycle-mode chord press.  The mode is process-wide
//! and read at the moment a session is handed off to the pipeline, so a
//! mid-recording mode change affects the in-flight session's processing
//! step, not its capture.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProcessingMode
// ---------------------------------------------------------------------------

/// How transcribed text is transformed before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// No transformation — the transcript is delivered verbatim.
    Raw,
    /// Remove filler words and fix punctuation.
    Clean,
    /// Format technical terms (function names, technology names, vocabulary).
    Tech,
    /// Clean + tech combined.
    Full,
}

/// Cycle order used by the cycle-mode chord.
const CYCLE: [ProcessingMode; 4] = [
    ProcessingMode::Raw,
    ProcessingMode::Clean,
    ProcessingMode::Tech,
    ProcessingMode::Full,
];

impl ProcessingMode {
    /// The next mode in the fixed cycle, wrapping after `Full`.
    pub fn next(self) -> Self {
        let idx = CYCLE.iter().position(|m| *m == self).unwrap_or(0);
        CYCLE[(idx + 1) % CYCLE.len()]
    }

    /// Lowercase name as used in config files and history entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Raw => "raw",
            ProcessingMode::Clean => "clean",
            ProcessingMode::Tech => "tech",
            ProcessingMode::Full => "full",
        }
    }
}

impl Default for ProcessingMode {
    fn default() -> Self {
        ProcessingMode::Full
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_advances_and_wraps() {
        assert_eq!(ProcessingMode::Raw.next(), ProcessingMode::Clean);
        assert_eq!(ProcessingMode::Clean.next(), ProcessingMode::Tech);
        assert_eq!(ProcessingMode::Tech.next(), ProcessingMode::Full);
        assert_eq!(ProcessingMode::Full.next(), ProcessingMode::Raw);
    }

    #[test]
    fn four_presses_return_to_start() {
        let start = ProcessingMode::Clean;
        assert_eq!(start.next().next().next().next(), start);
    }

    #[test]
    fn default_mode_is_full() {
        assert_eq!(ProcessingMode::default(), ProcessingMode::Full);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let toml = toml::to_string(&std::collections::BTreeMap::from([(
            "mode",
            ProcessingMode::Tech,
        )]))
        .unwrap();
        assert!(toml.contains("\"tech\""));
    }
}
