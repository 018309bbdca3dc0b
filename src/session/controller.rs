//! Session controller — turns hotkey edges into capture sessions.
//!
//! [`SessionController`] owns the edge loop.  It responds to
//! [`SessionEdge`]s received over a `tokio::sync::mpsc` channel:
//!
//! ```text
//! Activate / ActivateWithContext
//!   └─▶ assign id, phase = Recording, (snapshot clipboard), capture.begin
//!
//! Deactivate / DeactivateWithContext
//!   └─▶ phase = Processing, capture.end → hand audio to the pipeline
//!
//! CycleMode
//!   └─▶ advance the processing mode (never touches an open capture)
//! ```
//!
//! The controller is deliberately thin: everything after hand-off
//! (transcription, processing, delivery, linger) happens inside the
//! pipeline's per-session task, so the edge loop is free to accept the next
//! activation immediately.  Clipboard and capture I/O go through
//! `tokio::task::spawn_blocking` so the edge loop never stalls on them.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::capture::CaptureHandle;
use crate::hotkey::SessionEdge;
use crate::output::OutputSink;
use crate::pipeline::{SessionJob, SessionPipeline, ERROR_LINGER};

use super::state::{OpenSession, StatusHandle};
use super::Phase;

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Drives the activation side of the orchestrator.
///
/// Create with [`SessionController::new`], then call [`run`](Self::run)
/// inside a tokio task.
pub struct SessionController {
    status: StatusHandle,
    capture: Arc<dyn CaptureHandle>,
    output: Arc<dyn OutputSink>,
    pipeline: Arc<dyn SessionPipeline>,
}

impl SessionController {
    pub fn new(
        status: StatusHandle,
        capture: Arc<dyn CaptureHandle>,
        output: Arc<dyn OutputSink>,
        pipeline: Arc<dyn SessionPipeline>,
    ) -> Self {
        Self {
            status,
            capture,
            output,
            pipeline,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the controller until `edge_rx` is closed.
    ///
    /// This is an `async fn` and should be spawned as a tokio task from
    /// `main()`.  It never returns while the channel is open.
    pub async fn run(self, mut edge_rx: mpsc::Receiver<SessionEdge>) {
        while let Some(edge) = edge_rx.recv().await {
            self.handle_edge(edge).await;
        }
        log::info!("controller: edge channel closed, shutting down");
    }

    /// Handle a single semantic edge.
    pub async fn handle_edge(&self, edge: SessionEdge) {
        match edge {
            SessionEdge::Activate => self.handle_activate(false).await,
            SessionEdge::ActivateWithContext => self.handle_activate(true).await,
            SessionEdge::Deactivate | SessionEdge::DeactivateWithContext => {
                self.handle_deactivate().await;
            }
            SessionEdge::CycleMode => {
                self.status.cycle_mode();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Edge handlers
    // -----------------------------------------------------------------------

    /// Open a capture session.
    ///
    /// A second activation while a capture is already open is ignored — the
    /// adapter filters most of these, but a toggle-mode edge can still race
    /// a slow clipboard snapshot.
    async fn handle_activate(&self, context_requested: bool) {
        let id = {
            let mut st = self.status.state().lock().unwrap();
            if st.recording {
                log::warn!("activation while a capture is already open — ignored");
                return;
            }
            let id = st.next_id;
            st.next_id += 1;
            st.recording = true;
            st.last_error = None;
            st.open = Some(OpenSession {
                id,
                context_requested,
                snapshot: None,
            });
            id
        };

        self.status.set(id, Phase::Recording);

        // Context sessions snapshot the clipboard at activation, before any
        // audio is captured, so later copies cannot leak into this session.
        if context_requested {
            let output = Arc::clone(&self.output);
            let snapshot = match tokio::task::spawn_blocking(move || output.read_current()).await {
                Ok(Ok(text)) if !text.is_empty() => Some(text),
                Ok(Ok(_)) => {
                    log::debug!("session {id}: clipboard empty, no context");
                    None
                }
                Ok(Err(e)) => {
                    log::warn!("session {id}: clipboard snapshot failed: {e}");
                    None
                }
                Err(e) => {
                    log::warn!("session {id}: snapshot task panicked: {e}");
                    None
                }
            };

            let mut st = self.status.state().lock().unwrap();
            if let Some(open) = st.open.as_mut() {
                if open.id == id {
                    open.snapshot = snapshot;
                }
            }
        }

        let capture = Arc::clone(&self.capture);
        let begun = match tokio::task::spawn_blocking(move || capture.begin()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("capture task panicked: {e}")),
        };

        if let Err(message) = begun {
            {
                let mut st = self.status.state().lock().unwrap();
                st.recording = false;
                st.open = None;
            }
            self.status.set_error(id, format!("could not start capture: {message}"));
            self.status.release_after(id, ERROR_LINGER);
        }
    }

    /// Close the open capture and hand the audio to the pipeline.
    async fn handle_deactivate(&self) {
        let (open, mode) = {
            let mut st = self.status.state().lock().unwrap();
            if !st.recording {
                log::warn!("deactivation without an open capture — ignored");
                return;
            }
            st.recording = false;
            let open = match st.open.take() {
                Some(open) => open,
                None => return,
            };
            // Mode is read here, at hand-off: cycling mid-recording applies
            // to the recording being closed.
            (open, st.mode)
        };
        let id = open.id;

        self.status.set(id, Phase::Processing);

        let capture = Arc::clone(&self.capture);
        let audio = match tokio::task::spawn_blocking(move || capture.end()).await {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                self.status
                    .set_error(id, format!("could not stop capture: {e}"));
                self.status.release_after(id, ERROR_LINGER);
                return;
            }
            Err(e) => {
                self.status
                    .set_error(id, format!("capture task panicked: {e}"));
                self.status.release_after(id, ERROR_LINGER);
                return;
            }
        };

        if audio.is_empty() {
            // Nothing was captured (tap too short, device produced no
            // frames).  Not an error — just return to idle quietly.
            log::warn!("session {id}: no audio captured");
            self.status.set(id, Phase::Idle);
            return;
        }

        let context = if open.context_requested {
            open.snapshot
        } else {
            None
        };

        self.pipeline.spawn(SessionJob {
            id,
            audio,
            context,
            mode,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::capture::CaptureError;
    use crate::observer::ObserverBroadcast;
    use crate::output::DeliveryError;
    use crate::session::state::new_shared_state;
    use crate::session::ProcessingMode;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Capture that records begin/end calls and returns fixed bytes on end.
    struct FakeCapture {
        armed: AtomicBool,
        audio: Vec<u8>,
        fail_begin: bool,
    }

    impl FakeCapture {
        fn with_audio(audio: Vec<u8>) -> Self {
            Self {
                armed: AtomicBool::new(false),
                audio,
                fail_begin: false,
            }
        }
    }

    impl CaptureHandle for FakeCapture {
        fn begin(&self) -> Result<(), CaptureError> {
            if self.fail_begin {
                return Err(CaptureError::NoDevice);
            }
            self.armed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn end(&self) -> Result<Vec<u8>, CaptureError> {
            if !self.armed.swap(false, Ordering::SeqCst) {
                return Ok(Vec::new());
            }
            Ok(self.audio.clone())
        }
    }

    /// Clipboard stand-in with a fixed current text.
    struct FakeOutput {
        current: String,
        delivered: Mutex<Vec<String>>,
    }

    impl FakeOutput {
        fn with_clipboard(text: &str) -> Self {
            Self {
                current: text.to_string(),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl OutputSink for FakeOutput {
        fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
            self.delivered.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn read_current(&self) -> Result<String, DeliveryError> {
            Ok(self.current.clone())
        }
    }

    /// Pipeline that just records the jobs it was handed.
    #[derive(Default)]
    struct RecordingPipeline {
        jobs: Mutex<Vec<SessionJob>>,
    }

    impl SessionPipeline for RecordingPipeline {
        fn spawn(&self, job: SessionJob) {
            self.jobs.lock().unwrap().push(job);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Rig {
        controller: SessionController,
        status: StatusHandle,
        pipeline: Arc<RecordingPipeline>,
    }

    fn rig_with(capture: FakeCapture, output: FakeOutput) -> Rig {
        let status = StatusHandle::new(
            new_shared_state(ProcessingMode::Full),
            ObserverBroadcast::start(Vec::new()),
        );
        let pipeline = Arc::new(RecordingPipeline::default());
        let controller = SessionController::new(
            status.clone(),
            Arc::new(capture),
            Arc::new(output),
            Arc::clone(&pipeline) as Arc<dyn SessionPipeline>,
        );
        Rig {
            controller,
            status,
            pipeline,
        }
    }

    fn rig() -> Rig {
        rig_with(
            FakeCapture::with_audio(vec![1, 2, 3]),
            FakeOutput::with_clipboard(""),
        )
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn activate_then_deactivate_hands_audio_to_pipeline() {
        let r = rig();
        r.controller.handle_edge(SessionEdge::Activate).await;
        assert_eq!(r.status.state().lock().unwrap().phase, Phase::Recording);

        r.controller.handle_edge(SessionEdge::Deactivate).await;

        let jobs = r.pipeline.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].audio, vec![1, 2, 3]);
        assert_eq!(jobs[0].mode, ProcessingMode::Full);
        assert!(jobs[0].context.is_none());
    }

    #[tokio::test]
    async fn double_activation_opens_only_one_session() {
        let r = rig();
        r.controller.handle_edge(SessionEdge::Activate).await;
        r.controller.handle_edge(SessionEdge::Activate).await;
        r.controller.handle_edge(SessionEdge::Deactivate).await;

        assert_eq!(r.pipeline.jobs.lock().unwrap().len(), 1);
        // Only one id was consumed.
        assert_eq!(r.status.state().lock().unwrap().next_id, 2);
    }

    #[tokio::test]
    async fn deactivation_without_open_capture_is_ignored() {
        let r = rig();
        r.controller.handle_edge(SessionEdge::Deactivate).await;
        assert!(r.pipeline.jobs.lock().unwrap().is_empty());
        assert_eq!(r.status.state().lock().unwrap().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn empty_capture_returns_to_idle_without_a_job() {
        let r = rig_with(
            FakeCapture::with_audio(Vec::new()),
            FakeOutput::with_clipboard(""),
        );
        r.controller.handle_edge(SessionEdge::Activate).await;
        r.controller.handle_edge(SessionEdge::Deactivate).await;

        assert!(r.pipeline.jobs.lock().unwrap().is_empty());
        assert_eq!(r.status.state().lock().unwrap().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn context_activation_snapshots_clipboard_into_job() {
        let r = rig_with(
            FakeCapture::with_audio(vec![9]),
            FakeOutput::with_clipboard("fn main() {}"),
        );
        r.controller
            .handle_edge(SessionEdge::ActivateWithContext)
            .await;
        r.controller
            .handle_edge(SessionEdge::DeactivateWithContext)
            .await;

        let jobs = r.pipeline.jobs.lock().unwrap();
        assert_eq!(jobs[0].context.as_deref(), Some("fn main() {}"));
    }

    #[tokio::test]
    async fn plain_activation_never_reads_the_clipboard() {
        let r = rig_with(
            FakeCapture::with_audio(vec![9]),
            FakeOutput::with_clipboard("secret"),
        );
        r.controller.handle_edge(SessionEdge::Activate).await;
        r.controller.handle_edge(SessionEdge::Deactivate).await;

        let jobs = r.pipeline.jobs.lock().unwrap();
        assert!(jobs[0].context.is_none());
    }

    #[tokio::test]
    async fn capture_begin_failure_enters_error_and_clears_recording() {
        let capture = FakeCapture {
            armed: AtomicBool::new(false),
            audio: Vec::new(),
            fail_begin: true,
        };
        let r = rig_with(capture, FakeOutput::with_clipboard(""));
        r.controller.handle_edge(SessionEdge::Activate).await;

        let st = r.status.state().lock().unwrap();
        assert_eq!(st.phase, Phase::Error);
        assert!(!st.recording);
        assert!(st.open.is_none());
        assert!(st.last_error.is_some());
    }

    #[tokio::test]
    async fn mode_is_read_at_hand_off_not_activation() {
        let r = rig();
        r.controller.handle_edge(SessionEdge::Activate).await;
        // Cycle twice mid-recording: Full → Raw → Clean.
        r.controller.handle_edge(SessionEdge::CycleMode).await;
        r.controller.handle_edge(SessionEdge::CycleMode).await;
        r.controller.handle_edge(SessionEdge::Deactivate).await;

        let jobs = r.pipeline.jobs.lock().unwrap();
        assert_eq!(jobs[0].mode, ProcessingMode::Clean);
    }

    #[tokio::test]
    async fn session_reuse_assigns_fresh_ids() {
        let r = rig();
        r.controller.handle_edge(SessionEdge::Activate).await;
        r.controller.handle_edge(SessionEdge::Deactivate).await;
        r.controller.handle_edge(SessionEdge::Activate).await;
        r.controller.handle_edge(SessionEdge::Deactivate).await;

        let jobs = r.pipeline.jobs.lock().unwrap();
        assert_eq!(jobs[0].id, 1);
        assert_eq!(jobs[1].id, 2);
    }
}
