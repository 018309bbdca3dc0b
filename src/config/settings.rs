//! Application settings structs, defaults, TOML persistence and validation.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.  Every section carries `#[serde(default)]` — a partial
//! `config.toml` with only the keys the user cares about is valid.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::hotkey::{ActivationMode, Chord, HotkeyBindings, HotkeyError};
use crate::output::OutputBehavior;
use crate::session::ProcessingMode;

use super::AppPaths;

/// Environment variables consulted (in order) when a section has no
/// `api_key` in the file.
const API_KEY_ENV_VARS: [&str; 2] = ["VOXKEY_API_KEY", "GROQ_API_KEY"];

// ---------------------------------------------------------------------------
// HotkeysConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings, as chord strings (e.g. `"ctrl+shift+space"`).
///
/// `context_modifier` and `cycle_mode_key` may be empty strings to disable
/// the corresponding feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeysConfig {
    /// Hold-to-record vs press-to-toggle.
    pub activation_mode: ActivationMode,
    /// Main activation chord.
    pub main_key: String,
    /// Modifier that requests the context variant, e.g. `"alt"`.
    pub context_modifier: String,
    /// Chord that advances the processing mode.
    pub cycle_mode_key: String,
}

impl Default for HotkeysConfig {
    fn default() -> Self {
        Self {
            activation_mode: ActivationMode::default(),
            main_key: "ctrl+shift+space".into(),
            context_modifier: "alt".into(),
            cycle_mode_key: "ctrl+shift+m".into(),
        }
    }
}

impl HotkeysConfig {
    /// Parse the chord strings into [`HotkeyBindings`].
    ///
    /// Empty `context_modifier` / `cycle_mode_key` strings disable those
    /// features rather than erroring.
    pub fn bindings(&self) -> Result<HotkeyBindings, HotkeyError> {
        let main = Chord::parse(&self.main_key)?;

        let context_modifier = if self.context_modifier.trim().is_empty() {
            None
        } else {
            Some(crate::hotkey::parse_chord_key(self.context_modifier.trim())?)
        };

        let cycle = if self.cycle_mode_key.trim().is_empty() {
            None
        } else {
            Some(Chord::parse(&self.cycle_mode_key)?)
        };

        Ok(HotkeyBindings {
            activation_mode: self.activation_mode,
            main,
            context_modifier,
            cycle,
        })
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig
// ---------------------------------------------------------------------------

/// Settings for the speech-to-text API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of an OpenAI-compatible API (`/v1/audio/transcriptions` is
    /// appended).
    pub base_url: String,
    /// Bearer token — `None` falls back to the environment.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Primary speech language as an ISO-639-1 code, or `"auto"` to let the
    /// model detect it.
    pub language: String,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".into(),
            api_key: None,
            model: "whisper-large-v3".into(),
            language: "en".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessingConfig
// ---------------------------------------------------------------------------

/// Settings for the LLM post-processing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Base URL of an OpenAI-compatible API (`/v1/chat/completions` is
    /// appended).
    pub base_url: String,
    /// Bearer token — `None` falls back to the environment.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".into(),
            api_key: None,
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

/// How final text reaches the user.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Clipboard-only, or clipboard followed by a synthetic paste.
    pub behavior: OutputBehavior,
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

/// Dictation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Disable to keep no record of dictations.
    pub enabled: bool,
    /// Oldest entries are dropped beyond this count.
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Audio capture settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name (case-insensitive substring match) — `None` means
    /// the system default.
    pub device: Option<String>,
}

// ---------------------------------------------------------------------------
// Config  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Processing mode active at startup (cycling changes it at runtime).
    pub mode: ProcessingMode,
    /// Domain terms fed to the processing prompt to bias spelling.
    pub vocabulary: Vec<String>,
    /// Global hotkey bindings.
    pub hotkeys: HotkeysConfig,
    /// Speech-to-text API settings.
    pub transcription: TranscriptionConfig,
    /// LLM post-processing settings.
    pub processing: ProcessingConfig,
    /// Delivery settings.
    pub output: OutputConfig,
    /// Dictation history settings.
    pub history: HistoryConfig,
    /// Audio capture settings.
    pub audio: AudioConfig,
}

impl Config {
    /// Load configuration from the platform-appropriate `config.toml`,
    /// filling missing API keys from the environment.
    ///
    /// Returns defaults when the file does not exist yet (first-run
    /// scenario) so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().config_file)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from an explicit path (useful for tests).  Does not consult the
    /// environment.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `config.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().config_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fill missing API keys from the environment.
    ///
    /// Both sections fall back to the same variables — most deployments use
    /// one provider for both calls.
    pub fn apply_env(&mut self) {
        let env_key = API_KEY_ENV_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));

        if let Some(key) = env_key {
            if self.transcription.api_key.is_none() {
                self.transcription.api_key = Some(key.clone());
            }
            if self.processing.api_key.is_none() {
                self.processing.api_key = Some(key);
            }
        }
    }

    /// Check the configuration for problems a user would want to know about
    /// before the app starts listening.
    ///
    /// Returns human-readable issue descriptions; empty means the config is
    /// usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Err(e) = self.hotkeys.bindings() {
            issues.push(format!("hotkeys: {e}"));
        }

        if self.transcription.api_key.as_deref().unwrap_or("").is_empty() {
            issues.push(
                "transcription.api_key is not set (and no VOXKEY_API_KEY / GROQ_API_KEY \
                 in the environment)"
                    .into(),
            );
        }
        if self.transcription.timeout_secs == 0 {
            issues.push("transcription.timeout_secs must be greater than zero".into());
        }

        if self.mode != ProcessingMode::Raw {
            if self.processing.api_key.as_deref().unwrap_or("").is_empty() {
                issues.push(
                    "processing.api_key is not set (required for any mode other than raw)".into(),
                );
            }
            if !(0.0..=1.0).contains(&self.processing.temperature) {
                issues.push("processing.temperature must be between 0.0 and 1.0".into());
            }
            if self.processing.timeout_secs == 0 {
                issues.push("processing.timeout_secs must be greater than zero".into());
            }
        }

        if self.history.enabled && self.history.max_entries == 0 {
            issues.push("history.max_entries must be greater than zero when enabled".into());
        }

        issues
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
