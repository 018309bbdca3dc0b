//! Text delivery behind the [`OutputSink`] capability.
//!
//! [`ClipboardOutput`] always copies the final text to the clipboard and,
//! in auto-paste mode, follows up with the OS paste shortcut in the focused
//! window:
//!
//! | Platform | Shortcut |
//! |----------|----------|
//! | macOS    | ⌘V (Meta + V) |
//! | Windows / Linux | Ctrl+V |
//!
//! Concurrent pipeline tasks may deliver in any order (no cross-session
//! ordering guarantee), so each delivery holds an internal lock for its
//! whole set-then-paste sequence to keep the pair atomic.
//!
//! `arboard::Clipboard` and `enigo::Enigo` handles are created per call —
//! neither is `Send` on all platforms and both are cheap to construct.

use std::sync::Mutex;

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DeliveryError
// ---------------------------------------------------------------------------

/// Errors that can surface while delivering text.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Could not open or read the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Could not simulate a key press/release event.
    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),
}

// ---------------------------------------------------------------------------
// OutputSink
// ---------------------------------------------------------------------------

/// Capability the pipeline delivers through and the controller reads the
/// context snapshot from.
pub trait OutputSink: Send + Sync {
    /// Deliver the final text (clipboard set, optionally followed by paste).
    fn deliver(&self, text: &str) -> Result<(), DeliveryError>;

    /// Read the current clipboard text; empty string when the clipboard is
    /// empty or holds non-text data.
    fn read_current(&self) -> Result<String, DeliveryError>;
}

// ---------------------------------------------------------------------------
// OutputBehavior
// ---------------------------------------------------------------------------

/// What happens after the final text lands in the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputBehavior {
    /// Copy only; the user pastes manually.
    ClipboardOnly,
    /// Copy, wait a short delay, then simulate the paste shortcut.
    AutoPaste,
}

impl Default for OutputBehavior {
    fn default() -> Self {
        OutputBehavior::AutoPaste
    }
}

// ---------------------------------------------------------------------------
// ClipboardOutput
// ---------------------------------------------------------------------------

/// Clipboard-backed output sink.
pub struct ClipboardOutput {
    behavior: OutputBehavior,
    /// Milliseconds between the clipboard set and the simulated paste, so
    /// the clipboard manager flushes before the target app reads it.
    paste_delay_ms: u64,
    /// Serializes concurrent deliveries; see module docs.
    delivery_lock: Mutex<()>,
}

impl ClipboardOutput {
    pub fn new(behavior: OutputBehavior) -> Self {
        Self {
            behavior,
            paste_delay_ms: 100,
            delivery_lock: Mutex::new(()),
        }
    }
}

impl OutputSink for ClipboardOutput {
    fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        if text.is_empty() {
            return Ok(());
        }

        let _guard = self.delivery_lock.lock().unwrap();

        set_clipboard(text)?;

        if self.behavior == OutputBehavior::AutoPaste {
            std::thread::sleep(std::time::Duration::from_millis(self.paste_delay_ms));
            simulate_paste()?;
        }

        Ok(())
    }

    fn read_current(&self) -> Result<String, DeliveryError> {
        let mut clipboard = open_clipboard()?;
        // `get_text` errors when the clipboard is empty or non-text — both
        // count as "no context available", not as failures.
        Ok(clipboard.get_text().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Clipboard / keyboard helpers
// ---------------------------------------------------------------------------

fn open_clipboard() -> Result<Clipboard, DeliveryError> {
    Clipboard::new().map_err(|e| DeliveryError::ClipboardAccess(e.to_string()))
}

/// Write `text` into the system clipboard, replacing whatever was there.
fn set_clipboard(text: &str) -> Result<(), DeliveryError> {
    let mut clipboard = open_clipboard()?;
    clipboard
        .set_text(text)
        .map_err(|e| DeliveryError::ClipboardSet(e.to_string()))
}

/// Simulate the system paste shortcut in the currently focused window.
fn simulate_paste() -> Result<(), DeliveryError> {
    let mut enigo =
        Enigo::new(&Settings::default()).map_err(|e| DeliveryError::KeySimulation(e.to_string()))?;

    paste_sequence(|key, direction| {
        enigo.key(key, direction).map_err(|e| e.to_string())
    })
}

/// Drive the modifier+V paste sequence through `send`.
///
/// Once the modifier press has gone out, the release is attempted even if
/// the V click fails — otherwise a synthetic Ctrl/⌘ stays pressed
/// system-wide.  The first failure is the one reported.
fn paste_sequence<F>(mut send: F) -> Result<(), DeliveryError>
where
    F: FnMut(Key, Direction) -> Result<(), String>,
{
    #[cfg(target_os = "macos")]
    let modifier = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    let modifier = Key::Control;

    send(modifier, Direction::Press).map_err(DeliveryError::KeySimulation)?;

    let click = send(Key::Unicode('v'), Direction::Click);
    let release = send(modifier, Direction::Release);

    click.and(release).map_err(DeliveryError::KeySimulation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
