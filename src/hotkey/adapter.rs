//! [`EdgeAdapter`] — translates raw key edges into semantic session edges.
//!
//! The adapter owns no OS resources; it is fed `KeyPress`/`KeyRelease`
//! events one at a time (in arrival order) and returns at most one
//! [`SessionEdge`] per event.  Two activation modes are supported:
//!
//! * **push-to-talk** — the session is open exactly while the chord is
//!   held.  Only the first key-down after idle is honored; key-repeat and
//!   re-triggers while held are no-ops.  Release of the main chord's
//!   trailing key closes the session.
//! * **toggle** — each completed chord press flips a latch; odd presses
//!   open, even presses close.  The context flag is fixed at open and the
//!   modifier state at close is ignored.
//!
//! The context variant (`modifier+main`) is a superset of the main chord
//! and is always checked first, so holding the modifier wins over the bare
//! chord.  The cycle chord is independent of both and fires even
//! mid-session.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Chord, ChordKey, HotkeyError, SessionEdge};

// ---------------------------------------------------------------------------
// ActivationMode
// ---------------------------------------------------------------------------

/// How the main chord opens and closes sessions.
///
/// Immutable for the process lifetime; changing it requires a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Hold to record.
    PushToTalk,
    /// Press to start, press again to stop.
    Toggle,
}

impl Default for ActivationMode {
    fn default() -> Self {
        ActivationMode::PushToTalk
    }
}

// ---------------------------------------------------------------------------
// HotkeyBindings
// ---------------------------------------------------------------------------

/// Parsed chord configuration handed to the adapter.
#[derive(Debug, Clone)]
pub struct HotkeyBindings {
    pub activation_mode: ActivationMode,
    pub main: Chord,
    /// Modifier that switches activation to the context variant.
    pub context_modifier: Option<ChordKey>,
    /// Chord that advances the processing mode.
    pub cycle: Option<Chord>,
}

// ---------------------------------------------------------------------------
// EdgeAdapter
// ---------------------------------------------------------------------------

/// The activation state machine.  See module docs.
pub struct EdgeAdapter {
    mode: ActivationMode,
    main: Chord,
    /// `modifier+main`, precomputed.  Superset of `main`.
    context_chord: Option<Chord>,
    cycle: Option<Chord>,

    /// Physical keys currently held, as observed from the edge stream.
    pressed: HashSet<rdev::Key>,
    /// Push-to-talk: a session is open.
    active: bool,
    /// Context flag of the open session, fixed at open.
    context_active: bool,
    /// Toggle: latch state (true = open).
    toggle_latch: bool,
}

impl EdgeAdapter {
    /// Validate the bindings and build the adapter.
    ///
    /// Conflicting configuration (context modifier already inside the main
    /// chord, cycle chord equal to an activation chord) is rejected here,
    /// before any listener starts — never at runtime.
    pub fn new(bindings: HotkeyBindings) -> Result<Self, HotkeyError> {
        if let Some(modifier) = &bindings.context_modifier {
            if bindings.main.overlaps_key(modifier) {
                return Err(HotkeyError::ContextModifierInMainChord(format!(
                    "{modifier:?}"
                )));
            }
        }

        let context_chord = bindings
            .context_modifier
            .map(|m| bindings.main.with_modifier(m));

        if let Some(cycle) = &bindings.cycle {
            if cycle.same_keys(&bindings.main) {
                return Err(HotkeyError::CycleChordCollision(format!("{cycle:?}")));
            }
            if let Some(ctx) = &context_chord {
                if cycle.same_keys(ctx) {
                    return Err(HotkeyError::CycleChordCollision(format!("{cycle:?}")));
                }
            }
        }

        Ok(Self {
            mode: bindings.activation_mode,
            main: bindings.main,
            context_chord,
            cycle: bindings.cycle,
            pressed: HashSet::new(),
            active: false,
            context_active: false,
            toggle_latch: false,
        })
    }

    /// Feed a key-down edge.  Returns the semantic edge it produced, if any.
    pub fn on_key_press(&mut self, key: rdev::Key) -> Option<SessionEdge> {
        // OS key-repeat delivers press edges for keys already held.
        if !self.pressed.insert(key) {
            return None;
        }

        // Cycle is independent of the activation chords and fires even
        // while a session is open.
        if let Some(cycle) = &self.cycle {
            if cycle.contains(key) && cycle.satisfied(&self.pressed) {
                return Some(SessionEdge::CycleMode);
            }
        }

        match self.mode {
            ActivationMode::PushToTalk => self.push_to_talk_press(key),
            ActivationMode::Toggle => self.toggle_press(key),
        }
    }

    /// Feed a key-up edge.  Returns the semantic edge it produced, if any.
    pub fn on_key_release(&mut self, key: rdev::Key) -> Option<SessionEdge> {
        self.pressed.remove(&key);

        // Only push-to-talk reacts to releases, and only the release of the
        // trailing key of the chord that opened the session.
        if self.mode == ActivationMode::PushToTalk
            && self.active
            && self.main.trailing().matches(key)
        {
            self.active = false;
            let was_context = self.context_active;
            self.context_active = false;
            return Some(if was_context {
                SessionEdge::DeactivateWithContext
            } else {
                SessionEdge::Deactivate
            });
        }

        None
    }

    /// A session is currently open from the adapter's point of view.
    pub fn is_active(&self) -> bool {
        self.active || self.toggle_latch
    }

    fn push_to_talk_press(&mut self, key: rdev::Key) -> Option<SessionEdge> {
        // Re-trigger while held (or chord completed twice before release)
        // is a no-op.
        if self.active {
            return None;
        }

        // Superset first: holding the modifier always wins over the bare
        // chord.
        if let Some(ctx) = &self.context_chord {
            if ctx.contains(key) && ctx.satisfied(&self.pressed) {
                self.active = true;
                self.context_active = true;
                return Some(SessionEdge::ActivateWithContext);
            }
        }

        if self.main.contains(key) && self.main.satisfied(&self.pressed) {
            self.active = true;
            self.context_active = false;
            return Some(SessionEdge::Activate);
        }

        None
    }

    fn toggle_press(&mut self, key: rdev::Key) -> Option<SessionEdge> {
        let context_hit = self
            .context_chord
            .as_ref()
            .is_some_and(|c| c.contains(key) && c.satisfied(&self.pressed));
        let main_hit = self.main.contains(key) && self.main.satisfied(&self.pressed);

        if !context_hit && !main_hit {
            return None;
        }

        self.toggle_latch = !self.toggle_latch;

        if self.toggle_latch {
            self.context_active = context_hit;
            Some(if context_hit {
                SessionEdge::ActivateWithContext
            } else {
                SessionEdge::Activate
            })
        } else {
            // Close the currently open session with the flag fixed at open;
            // the modifier state of the closing press is ignored.
            let was_context = self.context_active;
            self.context_active = false;
            Some(if was_context {
                SessionEdge::DeactivateWithContext
            } else {
                SessionEdge::Deactivate
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rdev::Key;

    fn bindings(mode: ActivationMode) -> HotkeyBindings {
        HotkeyBindings {
            activation_mode: mode,
            main: Chord::parse("ctrl+shift+space").unwrap(),
            context_modifier: Some(ChordKey::Alt),
            cycle: Some(Chord::parse("ctrl+shift+m").unwrap()),
        }
    }

    fn ptt() -> EdgeAdapter {
        EdgeAdapter::new(bindings(ActivationMode::PushToTalk)).unwrap()
    }

    fn toggle() -> EdgeAdapter {
        EdgeAdapter::new(bindings(ActivationMode::Toggle)).unwrap()
    }

    /// Press ctrl, shift, then space; returns the edge from the final press.
    fn press_main(adapter: &mut EdgeAdapter) -> Option<SessionEdge> {
        assert_eq!(adapter.on_key_press(Key::ControlLeft), None);
        assert_eq!(adapter.on_key_press(Key::ShiftLeft), None);
        adapter.on_key_press(Key::Space)
    }

    fn release_main(adapter: &mut EdgeAdapter) -> Option<SessionEdge> {
        let edge = adapter.on_key_release(Key::Space);
        adapter.on_key_release(Key::ShiftLeft);
        adapter.on_key_release(Key::ControlLeft);
        edge
    }

    // ---- construction / configuration errors ----

    #[test]
    fn context_modifier_inside_main_chord_is_rejected() {
        let mut b = bindings(ActivationMode::PushToTalk);
        b.context_modifier = Some(ChordKey::Control);
        assert!(matches!(
            EdgeAdapter::new(b),
            Err(HotkeyError::ContextModifierInMainChord(_))
        ));
    }

    #[test]
    fn cycle_chord_equal_to_main_is_rejected() {
        let mut b = bindings(ActivationMode::PushToTalk);
        b.cycle = Some(Chord::parse("ctrl+shift+space").unwrap());
        assert!(matches!(
            EdgeAdapter::new(b),
            Err(HotkeyError::CycleChordCollision(_))
        ));
    }

    // ---- push-to-talk ----

    #[test]
    fn ptt_press_and_release_produce_one_session() {
        let mut a = ptt();
        assert_eq!(press_main(&mut a), Some(SessionEdge::Activate));
        assert!(a.is_active());
        assert_eq!(release_main(&mut a), Some(SessionEdge::Deactivate));
        assert!(!a.is_active());
    }

    #[test]
    fn ptt_key_repeat_while_held_is_ignored() {
        let mut a = ptt();
        assert_eq!(press_main(&mut a), Some(SessionEdge::Activate));
        // OS auto-repeat resends the trailing key.
        assert_eq!(a.on_key_press(Key::Space), None);
        assert_eq!(a.on_key_press(Key::Space), None);
        assert_eq!(release_main(&mut a), Some(SessionEdge::Deactivate));
    }

    #[test]
    fn ptt_trailing_key_tap_opens_a_fresh_session() {
        let mut a = ptt();
        assert_eq!(press_main(&mut a), Some(SessionEdge::Activate));
        assert_eq!(a.on_key_release(Key::Space), Some(SessionEdge::Deactivate));
        // ctrl+shift still held; tapping space again opens a new session.
        assert_eq!(a.on_key_press(Key::Space), Some(SessionEdge::Activate));
    }

    #[test]
    fn ptt_stray_release_while_idle_is_a_no_op() {
        let mut a = ptt();
        assert_eq!(a.on_key_release(Key::Space), None);
        assert!(!a.is_active());
    }

    #[test]
    fn ptt_modifier_held_wins_over_bare_chord() {
        let mut a = ptt();
        a.on_key_press(Key::Alt);
        assert_eq!(
            press_main(&mut a),
            Some(SessionEdge::ActivateWithContext)
        );
        // Trailing-key release closes with the context variant.
        assert_eq!(
            a.on_key_release(Key::Space),
            Some(SessionEdge::DeactivateWithContext)
        );
    }

    #[test]
    fn ptt_modifier_released_mid_session_still_closes_with_context() {
        let mut a = ptt();
        a.on_key_press(Key::Alt);
        assert_eq!(press_main(&mut a), Some(SessionEdge::ActivateWithContext));
        // User lets go of Alt before the trailing key.
        assert_eq!(a.on_key_release(Key::Alt), None);
        assert_eq!(
            a.on_key_release(Key::Space),
            Some(SessionEdge::DeactivateWithContext)
        );
    }

    #[test]
    fn ptt_duplicate_chord_completion_while_active_is_ignored() {
        let mut a = ptt();
        assert_eq!(press_main(&mut a), Some(SessionEdge::Activate));
        // Alt pressed mid-session completes the context chord; ignored.
        assert_eq!(a.on_key_press(Key::Alt), None);
    }

    // ---- toggle ----

    #[test]
    fn toggle_two_presses_produce_one_session() {
        let mut a = toggle();
        assert_eq!(press_main(&mut a), Some(SessionEdge::Activate));
        assert!(a.is_active());
        assert_eq!(release_main(&mut a), None);
        assert_eq!(press_main(&mut a), Some(SessionEdge::Deactivate));
        assert!(!a.is_active());
    }

    #[test]
    fn toggle_context_open_plain_close_keeps_open_flag() {
        let mut a = toggle();
        a.on_key_press(Key::Alt);
        assert_eq!(press_main(&mut a), Some(SessionEdge::ActivateWithContext));
        a.on_key_release(Key::Alt);
        release_main(&mut a);
        // Closing press without the modifier still closes with context.
        assert_eq!(
            press_main(&mut a),
            Some(SessionEdge::DeactivateWithContext)
        );
    }

    #[test]
    fn toggle_plain_open_context_close_ignores_close_modifier() {
        let mut a = toggle();
        assert_eq!(press_main(&mut a), Some(SessionEdge::Activate));
        release_main(&mut a);
        // Modifier held on the closing press; flag was fixed at open.
        a.on_key_press(Key::Alt);
        assert_eq!(press_main(&mut a), Some(SessionEdge::Deactivate));
    }

    #[test]
    fn toggle_release_never_emits() {
        let mut a = toggle();
        press_main(&mut a);
        assert_eq!(a.on_key_release(Key::Space), None);
        assert!(a.is_active());
    }

    // ---- cycle ----

    #[test]
    fn cycle_chord_fires_when_idle() {
        let mut a = ptt();
        a.on_key_press(Key::ControlLeft);
        a.on_key_press(Key::ShiftLeft);
        assert_eq!(a.on_key_press(Key::KeyM), Some(SessionEdge::CycleMode));
    }

    #[test]
    fn cycle_chord_fires_mid_session_without_closing_it() {
        let mut a = ptt();
        assert_eq!(press_main(&mut a), Some(SessionEdge::Activate));
        // ctrl+shift still held from the main chord; M completes the cycle chord.
        assert_eq!(a.on_key_press(Key::KeyM), Some(SessionEdge::CycleMode));
        assert!(a.is_active());
        a.on_key_release(Key::KeyM);
        assert_eq!(
            a.on_key_release(Key::Space),
            Some(SessionEdge::Deactivate)
        );
    }

    #[test]
    fn cycle_key_repeat_is_ignored() {
        let mut a = ptt();
        a.on_key_press(Key::ControlLeft);
        a.on_key_press(Key::ShiftLeft);
        assert_eq!(a.on_key_press(Key::KeyM), Some(SessionEdge::CycleMode));
        assert_eq!(a.on_key_press(Key::KeyM), None);
        a.on_key_release(Key::KeyM);
        assert_eq!(a.on_key_press(Key::KeyM), Some(SessionEdge::CycleMode));
    }
}
