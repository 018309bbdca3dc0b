//! Shared session state and the [`StatusHandle`] that mutates it.
//!
//! [`SessionState`] is the single source of truth for the orchestrator:
//! current phase, active processing mode, whether a capture is open, and the
//! most recent result or error.  It lives behind [`SharedState`]
//! (`Arc<Mutex<…>>`) — cheap to clone, locked only for short critical
//! sections, never across an `.await`.
//!
//! Phase writes go through [`StatusHandle`] so that every change is also
//! fanned out to the observers.  Each write records the session id that made
//! it; [`StatusHandle::release`] only returns the phase to `Idle` when the
//! caller still owns it, so a slow session finishing late cannot clobber the
//! display of a newer one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::observer::ObserverBroadcast;

use super::{Phase, ProcessingMode};

// ---------------------------------------------------------------------------
// OpenSession
// ---------------------------------------------------------------------------

/// Bookkeeping for the currently recording session, if any.
#[derive(Debug, Clone)]
pub struct OpenSession {
    /// Monotonic session id, assigned at activation.
    pub id: u64,
    /// The activation edge carried the context variant.
    pub context_requested: bool,
    /// Clipboard snapshot taken at activation (context sessions only).
    pub snapshot: Option<String>,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Shared orchestrator state.
///
/// Mutated by the controller and the pipeline tasks; read by anything that
/// wants a consistent view of what the app is doing.
pub struct SessionState {
    /// Current phase, as shown to observers.
    pub phase: Phase,
    /// Active processing mode.  Read at hand-off, not at activation.
    pub mode: ProcessingMode,
    /// A capture is currently open.
    pub recording: bool,
    /// The open session's bookkeeping, while recording.
    pub open: Option<OpenSession>,
    /// Next session id to hand out.
    pub next_id: u64,
    /// Id of the session that last wrote `phase`.
    pub phase_owner: u64,
    /// Message of the most recent failure, cleared on the next activation.
    pub last_error: Option<String>,
    /// Most recently delivered text.
    pub last_text: Option<String>,
}

impl SessionState {
    pub fn new(mode: ProcessingMode) -> Self {
        Self {
            phase: Phase::Idle,
            mode,
            recording: false,
            open: None,
            next_id: 1,
            phase_owner: 0,
            last_error: None,
            last_text: None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(ProcessingMode::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionState`].
///
/// Lock with `.lock().unwrap()` for a short critical section; do **not**
/// hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<SessionState>>;

/// Construct a new [`SharedState`] starting in `Idle` with the given mode.
pub fn new_shared_state(mode: ProcessingMode) -> SharedState {
    Arc::new(Mutex::new(SessionState::new(mode)))
}

// ---------------------------------------------------------------------------
// StatusHandle
// ---------------------------------------------------------------------------

/// Phase writer shared by the controller and the pipeline tasks.
///
/// Every phase write is stamped with the writing session's id and mirrored
/// to the observers.  Cloning is cheap.
#[derive(Clone)]
pub struct StatusHandle {
    state: SharedState,
    broadcast: ObserverBroadcast,
}

impl StatusHandle {
    pub fn new(state: SharedState, broadcast: ObserverBroadcast) -> Self {
        Self { state, broadcast }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Set the phase on behalf of session `id` and notify observers.
    ///
    /// Last writer wins; ordering across sessions is resolved by
    /// [`release`](Self::release), not here.
    pub fn set(&self, id: u64, phase: Phase) {
        let mode = {
            let mut st = self.state.lock().unwrap();
            st.phase = phase;
            st.phase_owner = id;
            st.mode
        };
        log::debug!("session {id}: phase → {phase}");
        self.broadcast.notify(phase, mode);
    }

    /// Enter the `Error` phase with a message, on behalf of session `id`.
    pub fn set_error(&self, id: u64, message: String) {
        let mode = {
            let mut st = self.state.lock().unwrap();
            st.phase = Phase::Error;
            st.phase_owner = id;
            st.last_error = Some(message.clone());
            st.mode
        };
        log::error!("session {id}: {message}");
        self.broadcast.notify(Phase::Error, mode);
    }

    /// Record the delivered text for session `id` and enter `Ready`.
    pub fn set_ready(&self, id: u64, text: String) {
        let mode = {
            let mut st = self.state.lock().unwrap();
            st.phase = Phase::Ready;
            st.phase_owner = id;
            st.last_text = Some(text);
            st.mode
        };
        log::debug!("session {id}: phase → {}", Phase::Ready);
        self.broadcast.notify(Phase::Ready, mode);
    }

    /// Return the phase to `Idle` after a terminal linger, but only if
    /// session `id` still owns it and no newer capture has started.
    ///
    /// A stale release (another session has since written the phase, or a
    /// new recording is underway) is a silent no-op.
    pub fn release(&self, id: u64) {
        let notify = {
            let mut st = self.state.lock().unwrap();
            if st.phase_owner == id && !st.recording && st.phase.is_terminal() {
                st.phase = Phase::Idle;
                Some(st.mode)
            } else {
                None
            }
        };
        if let Some(mode) = notify {
            self.broadcast.notify(Phase::Idle, mode);
        }
    }

    /// Return the phase to `Idle` immediately, without a terminal phase, but
    /// only if session `id` still owns it and no newer capture has started.
    ///
    /// Used when a session ends without anything to show (empty transcript):
    /// it skips the `Ready`/`Error` linger entirely, yet must not knock the
    /// display out from under a newer session that has since taken over.
    pub fn discard(&self, id: u64) {
        let notify = {
            let mut st = self.state.lock().unwrap();
            if st.phase_owner == id && !st.recording {
                st.phase = Phase::Idle;
                Some(st.mode)
            } else {
                None
            }
        };
        if let Some(mode) = notify {
            log::debug!("session {id}: phase → {}", Phase::Idle);
            self.broadcast.notify(Phase::Idle, mode);
        }
    }

    /// Spawn a task that releases session `id` after `linger`.
    pub fn release_after(&self, id: u64, linger: Duration) {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            handle.release(id);
        });
    }

    /// Advance the processing mode and re-notify observers with the current
    /// phase so displays can update the mode indicator immediately.
    ///
    /// Cycling never touches an in-flight session: mode is read at hand-off.
    pub fn cycle_mode(&self) -> ProcessingMode {
        let (phase, mode) = {
            let mut st = self.state.lock().unwrap();
            st.mode = st.mode.next();
            (st.phase, st.mode)
        };
        log::info!("processing mode → {}", mode.as_str());
        self.broadcast.notify(phase, mode);
        mode
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
