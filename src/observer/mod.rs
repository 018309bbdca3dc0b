//! Phase-change fan-out to passive observers.
//!
//! [`ObserverBroadcast`] owns a dedicated notification thread fed by an
//! unbounded channel, so callers (the controller's locked section, pipeline
//! tasks) never block on an observer.  Observer failures are caught and
//! logged; they never propagate and never prevent the remaining observers
//! from being notified.
//!
//! The crate ships [`LogObserver`]; tray and sound feedback plug in through
//! the same [`PhaseObserver`] trait from outside the core.

use std::sync::mpsc;
use std::sync::Arc;

use thiserror::Error;

use crate::session::{Phase, ProcessingMode};

// ---------------------------------------------------------------------------
// ObserverError
// ---------------------------------------------------------------------------

/// Failure inside a single observer (e.g. a sound device error).
///
/// Always swallowed by the broadcast after logging.
#[derive(Debug, Error)]
#[error("observer failed: {0}")]
pub struct ObserverError(pub String);

// ---------------------------------------------------------------------------
// PhaseObserver
// ---------------------------------------------------------------------------

/// Passive listener for `(phase, mode)` notifications.
///
/// Implementations must be `Send + Sync`; they are invoked from the
/// broadcast thread, one notification at a time, in registration order.
pub trait PhaseObserver: Send + Sync {
    fn on_phase_changed(&self, phase: Phase, mode: ProcessingMode) -> Result<(), ObserverError>;
}

// ---------------------------------------------------------------------------
// ObserverBroadcast
// ---------------------------------------------------------------------------

/// Fire-and-forget fan-out of phase changes.
///
/// Cheap to clone (clones the channel sender).  Notifications are delivered
/// in send order by a background thread; [`notify`](Self::notify) itself
/// never blocks.  The thread exits when every clone has been dropped.
#[derive(Clone)]
pub struct ObserverBroadcast {
    tx: mpsc::Sender<(Phase, ProcessingMode)>,
}

impl ObserverBroadcast {
    /// Start the notification thread over a fixed observer set.
    ///
    /// Observer membership is fixed at construction; registration changes
    /// are rare enough in practice that rebuilding the broadcast is simpler
    /// than locking a membership list on the hot path.
    pub fn start(observers: Vec<Arc<dyn PhaseObserver>>) -> Self {
        let (tx, rx) = mpsc::channel::<(Phase, ProcessingMode)>();

        std::thread::Builder::new()
            .name("observer-broadcast".into())
            .spawn(move || {
                while let Ok((phase, mode)) = rx.recv() {
                    for obs in &observers {
                        if let Err(e) = obs.on_phase_changed(phase, mode) {
                            log::warn!("observer error ignored: {e}");
                        }
                    }
                }
            })
            .expect("failed to spawn observer-broadcast thread");

        Self { tx }
    }

    /// Queue a `(phase, mode)` notification.  Never blocks.
    pub fn notify(&self, phase: Phase, mode: ProcessingMode) {
        // Send fails only after the broadcast thread has exited (shutdown).
        let _ = self.tx.send((phase, mode));
    }
}

// ---------------------------------------------------------------------------
// LogObserver
// ---------------------------------------------------------------------------

/// Built-in observer that logs every phase change at info level.
pub struct LogObserver;

impl PhaseObserver for LogObserver {
    fn on_phase_changed(&self, phase: Phase, mode: ProcessingMode) -> Result<(), ObserverError> {
        log::info!("phase={phase} mode={mode}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
