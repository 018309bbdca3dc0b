//! voxkey — hotkey-driven voice dictation.
//!
//! Hold a global hotkey, speak, release: the captured audio is transcribed,
//! optionally cleaned up by an LLM, and lands in the clipboard (with an
//! optional synthetic paste).  A modifier variant feeds the current
//! clipboard text to the LLM as context, and a cycle chord switches between
//! processing modes on the fly.
//!
//! # Module map
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`hotkey`] | chord parsing, the edge state machine, the rdev listener |
//! | [`session`] | phases, modes, shared state, the edge-driven controller |
//! | [`capture`] | cpal microphone capture and WAV encoding |
//! | [`transcribe`] | speech-to-text API client |
//! | [`process`] | LLM post-processing (prompts per mode) |
//! | [`output`] | clipboard delivery and paste simulation |
//! | [`history`] | JSONL dictation log |
//! | [`pipeline`] | per-session transcribe → process → deliver tasks |
//! | [`observer`] | phase fan-out to display/sound hooks |
//! | [`config`] | TOML settings, env fallback, validation, paths |
//! | [`app`] | wiring it all together |

pub mod app;
pub mod capture;
pub mod config;
pub mod history;
pub mod hotkey;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod session;
pub mod transcribe;
