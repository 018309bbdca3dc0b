//! Application assembly — builds the full orchestrator from a [`Config`].
//!
//! # Architecture
//!
//! ```text
//! rdev thread ── EdgeAdapter ── mpsc ──▶ SessionController
//!                                            │
//!                              MicCapture ◀──┤──▶ PipelineRunner (per-session tasks)
//!                                            │         │
//!                                      StatusHandle ◀──┘
//!                                            │
//!                                   ObserverBroadcast ──▶ LogObserver, …
//! ```
//!
//! [`App::build`] wires everything; [`App::run`] drives the edge loop until
//! the hotkey channel closes.  The caller keeps a [`PipelineRunner`] clone
//! (via [`App::pipeline`]) to drain in-flight sessions at shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::capture::{CaptureHandle, MicCapture};
use crate::config::{AppPaths, Config};
use crate::history::JsonlHistory;
use crate::hotkey::{EdgeAdapter, HotkeyListener};
use crate::observer::{LogObserver, ObserverBroadcast, PhaseObserver};
use crate::output::{ClipboardOutput, OutputSink};
use crate::pipeline::{PipelineRunner, SessionPipeline};
use crate::process::ApiProcessor;
use crate::session::{new_shared_state, SessionController, StatusHandle};
use crate::transcribe::ApiTranscriber;

/// Capacity of the edge channel between the rdev thread and the controller.
const EDGE_CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// The fully wired application, ready to run.
pub struct App {
    controller: SessionController,
    edge_rx: mpsc::Receiver<crate::hotkey::SessionEdge>,
    runner: PipelineRunner,
    /// Keeps the rdev thread forwarding edges; dropped on shutdown.
    _listener: HotkeyListener,
}

impl App {
    /// Wire all components from `config`.
    ///
    /// Fails on unparseable or conflicting hotkey chords; everything else
    /// (missing microphone, unreachable APIs) degrades at runtime into
    /// per-session errors instead.
    pub fn build(config: Config) -> Result<Self> {
        let bindings = config.hotkeys.bindings()?;
        log::info!(
            "hotkeys: {} = {:?} (mode {:?}), context modifier {:?}, cycle {:?}",
            config.hotkeys.main_key,
            bindings.main,
            bindings.activation_mode,
            bindings.context_modifier,
            config.hotkeys.cycle_mode_key,
        );
        let adapter = EdgeAdapter::new(bindings)?;

        let observers: Vec<Arc<dyn PhaseObserver>> = vec![Arc::new(LogObserver)];
        let broadcast = ObserverBroadcast::start(observers);
        let status = StatusHandle::new(new_shared_state(config.mode), broadcast);

        let capture: Arc<dyn CaptureHandle> =
            Arc::new(MicCapture::start(config.audio.device.clone()));
        let output: Arc<dyn OutputSink> = Arc::new(ClipboardOutput::new(config.output.behavior));

        let paths = AppPaths::new();
        let history = Arc::new(JsonlHistory::new(
            paths.history_file,
            config.history.max_entries,
            config.history.enabled,
        ));
        log::info!(
            "history: {} ({} entries max)",
            if config.history.enabled { "enabled" } else { "disabled" },
            config.history.max_entries
        );

        let runner = PipelineRunner::new(
            status.clone(),
            Arc::new(ApiTranscriber::from_config(&config.transcription)),
            Arc::new(ApiProcessor::from_config(&config.processing)),
            Arc::clone(&output),
            history,
            config.vocabulary.clone(),
            config.transcription.language.clone(),
        );

        let (edge_tx, edge_rx) = mpsc::channel(EDGE_CHANNEL_CAPACITY);
        let listener = HotkeyListener::start(adapter, edge_tx);

        let controller = SessionController::new(
            status,
            capture,
            output,
            Arc::new(runner.clone()) as Arc<dyn SessionPipeline>,
        );

        log::info!(
            "ready: mode {}, transcription model {}, processing model {}",
            config.mode.as_str(),
            config.transcription.model,
            config.processing.model
        );

        Ok(Self {
            controller,
            edge_rx,
            runner,
            _listener: listener,
        })
    }

    /// A handle for shutdown draining.
    pub fn pipeline(&self) -> PipelineRunner {
        self.runner.clone()
    }

    /// Run the edge loop until the hotkey channel closes.
    pub async fn run(self) {
        self.controller.run(self.edge_rx).await;
    }
}

// ---------------------------------------------------------------------------
// Shutdown draining
// ---------------------------------------------------------------------------

/// Wait up to `grace` for in-flight sessions to finish.
///
/// A session that is still transcribing when the user quits deserves a
/// chance to land in the clipboard and the history file.
pub async fn drain_in_flight(runner: &PipelineRunner, grace: Duration) {
    if runner.in_flight() == 0 {
        return;
    }

    log::info!(
        "waiting up to {:?} for {} in-flight session(s)",
        grace,
        runner.in_flight()
    );

    let deadline = Instant::now() + grace;
    while runner.in_flight() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let remaining = runner.in_flight();
    if remaining > 0 {
        log::warn!("abandoning {remaining} unfinished session(s)");
    }
}
