//! Global hotkey handling: chord parsing, the activation adapter, and the
//! rdev OS-thread listener.
//!
//! # Design
//!
//! Raw key edges flow through three layers:
//!
//! ```text
//! rdev::listen (dedicated OS thread)
//!        │ KeyPress / KeyRelease
//!        ▼
//! EdgeAdapter  — pure state machine, push-to-talk or toggle semantics
//!        │ SessionEdge
//!        ▼
//! tokio mpsc ──▶ SessionController (async edge loop)
//! ```
//!
//! The adapter is a plain struct with no OS dependency, so the activation
//! semantics are unit-testable without a keyboard.

pub mod adapter;
pub mod listener;

pub use adapter::{ActivationMode, EdgeAdapter, HotkeyBindings};
pub use listener::HotkeyListener;

use std::collections::HashSet;

use thiserror::Error;

// ---------------------------------------------------------------------------
// SessionEdge
// ---------------------------------------------------------------------------

/// Semantic session edges produced by the [`EdgeAdapter`].
///
/// Exactly one edge is emitted per honored physical action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEdge {
    /// Open a session.
    Activate,
    /// Open a session with a clipboard context snapshot.
    ActivateWithContext,
    /// Close the open session.
    Deactivate,
    /// Close the open session (context variant; the controller treats both
    /// closes identically — the flag was fixed at open).
    DeactivateWithContext,
    /// Advance the processing mode by one step.
    CycleMode,
}

// ---------------------------------------------------------------------------
// HotkeyError
// ---------------------------------------------------------------------------

/// Configuration problems surfaced at startup, before the listener runs.
#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("unknown key name: {0:?}")]
    UnknownKey(String),

    #[error("empty key chord")]
    EmptyChord,

    #[error("context modifier {0:?} is already part of the main chord")]
    ContextModifierInMainChord(String),

    #[error("cycle chord {0:?} collides with an activation chord")]
    CycleChordCollision(String),
}

// ---------------------------------------------------------------------------
// ChordKey
// ---------------------------------------------------------------------------

/// One component of a chord.
///
/// Modifier classes match either physical variant (left/right), so
/// `"ctrl+shift+space"` works with both control keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordKey {
    Control,
    Shift,
    Alt,
    Meta,
    Key(rdev::Key),
}

impl ChordKey {
    /// Does a physical key event satisfy this component?
    pub fn matches(&self, key: rdev::Key) -> bool {
        use rdev::Key::*;
        match self {
            ChordKey::Control => matches!(key, ControlLeft | ControlRight),
            ChordKey::Shift => matches!(key, ShiftLeft | ShiftRight),
            ChordKey::Alt => matches!(key, Alt | AltGr),
            ChordKey::Meta => matches!(key, MetaLeft | MetaRight),
            ChordKey::Key(k) => key == *k,
        }
    }

    /// Do two components cover any of the same physical keys?
    pub fn overlaps(&self, other: &ChordKey) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (ChordKey::Key(k), _) => other.matches(*k),
            (_, ChordKey::Key(k)) => self.matches(*k),
            _ => false,
        }
    }
}

/// Parse a single chord component name.
pub fn parse_chord_key(name: &str) -> Result<ChordKey, HotkeyError> {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "ctrl" | "control" => Ok(ChordKey::Control),
        "shift" => Ok(ChordKey::Shift),
        "alt" | "option" => Ok(ChordKey::Alt),
        "meta" | "cmd" | "win" | "super" => Ok(ChordKey::Meta),
        _ => parse_key(&lower)
            .map(ChordKey::Key)
            .ok_or_else(|| HotkeyError::UnknownKey(name.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Chord
// ---------------------------------------------------------------------------

/// An ordered key combination such as `ctrl+shift+space`.
///
/// The last component is the trailing key — the one whose release closes a
/// push-to-talk session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    keys: Vec<ChordKey>,
}

impl Chord {
    /// Parse a `+`-separated chord string (case-insensitive, spaces ignored).
    pub fn parse(spec: &str) -> Result<Self, HotkeyError> {
        let keys = spec
            .replace(' ', "")
            .split('+')
            .filter(|p| !p.is_empty())
            .map(parse_chord_key)
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(HotkeyError::EmptyChord);
        }
        Ok(Self { keys })
    }

    /// A chord extended with a leading modifier (the context variant).
    pub fn with_modifier(&self, modifier: ChordKey) -> Self {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.push(modifier);
        keys.extend_from_slice(&self.keys);
        Self { keys }
    }

    /// All components satisfied by the currently pressed set.
    pub fn satisfied(&self, pressed: &HashSet<rdev::Key>) -> bool {
        self.keys
            .iter()
            .all(|ck| pressed.iter().any(|k| ck.matches(*k)))
    }

    /// Does `key` belong to this chord?
    pub fn contains(&self, key: rdev::Key) -> bool {
        self.keys.iter().any(|ck| ck.matches(key))
    }

    /// The trailing (final) component.
    pub fn trailing(&self) -> ChordKey {
        *self.keys.last().expect("chord is never empty")
    }

    /// Does any component of `self` overlap any component of `other`?
    pub fn overlaps_key(&self, other: &ChordKey) -> bool {
        self.keys.iter().any(|a| a.overlaps(other))
    }

    /// Same key set (order-insensitive) as `other`.
    pub fn same_keys(&self, other: &Chord) -> bool {
        self.keys.len() == other.keys.len()
            && self.keys.iter().all(|a| other.keys.contains(a))
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a non-modifier key name (already lowercased) into an [`rdev::Key`].
///
/// Supports F1–F12, common named keys, single ASCII letters and digits.
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;

    let named = match name {
        "f1" => Some(F1),
        "f2" => Some(F2),
        "f3" => Some(F3),
        "f4" => Some(F4),
        "f5" => Some(F5),
        "f6" => Some(F6),
        "f7" => Some(F7),
        "f8" => Some(F8),
        "f9" => Some(F9),
        "f10" => Some(F10),
        "f11" => Some(F11),
        "f12" => Some(F12),
        "escape" | "esc" => Some(Escape),
        "space" => Some(Space),
        "return" | "enter" => Some(Return),
        "tab" => Some(Tab),
        "backspace" => Some(Backspace),
        "delete" | "del" => Some(Delete),
        "home" => Some(Home),
        "end" => Some(End),
        "pageup" => Some(PageUp),
        "pagedown" => Some(PageDown),
        "up" => Some(UpArrow),
        "down" => Some(DownArrow),
        "left" => Some(LeftArrow),
        "right" => Some(RightArrow),
        "capslock" => Some(CapsLock),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let mut chars = name.chars();
    let (c, rest) = (chars.next()?, chars.next());
    if rest.is_some() {
        return None;
    }

    match c {
        'a' => Some(KeyA),
        'b' => Some(KeyB),
        'c' => Some(KeyC),
        'd' => Some(KeyD),
        'e' => Some(KeyE),
        'f' => Some(KeyF),
        'g' => Some(KeyG),
        'h' => Some(KeyH),
        'i' => Some(KeyI),
        'j' => Some(KeyJ),
        'k' => Some(KeyK),
        'l' => Some(KeyL),
        'm' => Some(KeyM),
        'n' => Some(KeyN),
        'o' => Some(KeyO),
        'p' => Some(KeyP),
        'q' => Some(KeyQ),
        'r' => Some(KeyR),
        's' => Some(KeyS),
        't' => Some(KeyT),
        'u' => Some(KeyU),
        'v' => Some(KeyV),
        'w' => Some(KeyW),
        'x' => Some(KeyX),
        'y' => Some(KeyY),
        'z' => Some(KeyZ),
        '0' => Some(Num0),
        '1' => Some(Num1),
        '2' => Some(Num2),
        '3' => Some(Num3),
        '4' => Some(Num4),
        '5' => Some(Num5),
        '6' => Some(Num6),
        '7' => Some(Num7),
        '8' => Some(Num8),
        '9' => Some(Num9),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
