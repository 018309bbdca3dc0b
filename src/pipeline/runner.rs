//! [`PipelineRunner`] — executes one [`SessionJob`] per tokio task.
//!
//! # Job flow
//!
//! ```text
//! SessionJob
//!   └─▶ transcriber.transcribe                      [Processing]
//!         ├─ empty transcript → back to Idle (no history, no delivery)
//!         └─▶ mode == Raw ? verbatim
//!             else        → processor.process (context truncated first)
//!               └─▶ history.append (failure logged, never fatal)
//!                     └─▶ output.deliver (spawn_blocking)   [Ready]
//!                           └─▶ linger, then release to Idle
//! any failure ──▶ [Error] + message, linger, release to Idle
//! ```
//!
//! Blocking work (clipboard delivery, history file append) is pushed onto
//! `tokio::task::spawn_blocking` so the async runtime never stalls.  Phase
//! returns to `Idle` go through [`StatusHandle::release`] (after a linger)
//! or [`StatusHandle::discard`] (empty transcript), both of which ignore
//! stale owners, so a slow session finishing after a newer one has started
//! cannot knock the display back to `Idle` underneath it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::history::{HistoryEntry, HistorySink};
use crate::output::OutputSink;
use crate::process::TextProcessor;
use crate::session::{ProcessingMode, StatusHandle};
use crate::transcribe::Transcriber;

use super::{SessionJob, SessionPipeline, CONTEXT_MAX_CHARS, ERROR_LINGER, READY_LINGER};

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Runs sessions to completion.  Cheap to clone; each spawned job gets its
/// own clone.
#[derive(Clone)]
pub struct PipelineRunner {
    status: StatusHandle,
    transcriber: Arc<dyn Transcriber>,
    processor: Arc<dyn TextProcessor>,
    output: Arc<dyn OutputSink>,
    history: Arc<dyn HistorySink>,
    vocabulary: Arc<Vec<String>>,
    language: Arc<String>,
    in_flight: Arc<AtomicUsize>,
}

impl PipelineRunner {
    pub fn new(
        status: StatusHandle,
        transcriber: Arc<dyn Transcriber>,
        processor: Arc<dyn TextProcessor>,
        output: Arc<dyn OutputSink>,
        history: Arc<dyn HistorySink>,
        vocabulary: Vec<String>,
        language: String,
    ) -> Self {
        Self {
            status,
            transcriber,
            processor,
            output,
            history,
            vocabulary: Arc::new(vocabulary),
            language: Arc::new(language),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of sessions currently being processed.  Used by the shutdown
    /// path to drain in-flight work before exiting.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one job to completion.  Public for tests; production code goes
    /// through [`SessionPipeline::spawn`].
    pub async fn run(&self, job: SessionJob) {
        let SessionJob {
            id,
            audio,
            context,
            mode,
        } = job;

        log::debug!(
            "session {id}: pipeline start ({} bytes, mode {})",
            audio.len(),
            mode.as_str()
        );

        // ── 1. Transcription ─────────────────────────────────────────────
        let raw = match self.transcriber.transcribe(audio, &self.language).await {
            Ok(text) => text,
            Err(e) => {
                self.fail(id, format!("transcription failed: {e}"));
                return;
            }
        };

        if raw.trim().is_empty() {
            // Silence or breath noise.  Not worth a history entry or an
            // error display.
            log::warn!("session {id}: empty transcript, discarding");
            self.status.discard(id);
            return;
        }

        log::debug!("session {id}: transcript = {raw:?}");

        // ── 2. Processing ────────────────────────────────────────────────
        let had_context = context.is_some();
        let processed = if mode == ProcessingMode::Raw {
            raw.clone()
        } else {
            let truncated = context.as_deref().map(truncate_context);
            match self
                .processor
                .process(&raw, mode, &self.vocabulary, truncated)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    self.fail(id, format!("processing failed: {e}"));
                    return;
                }
            }
        };

        // ── 3. History ───────────────────────────────────────────────────
        // A history failure must never cost the user their dictation.
        let entry = HistoryEntry::now(mode, &raw, &processed, had_context);
        let history = Arc::clone(&self.history);
        match tokio::task::spawn_blocking(move || history.append(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("session {id}: history append failed: {e}"),
            Err(e) => log::warn!("session {id}: history task panicked: {e}"),
        }

        // ── 4. Delivery ──────────────────────────────────────────────────
        let output = Arc::clone(&self.output);
        let text = processed.clone();
        match tokio::task::spawn_blocking(move || output.deliver(&text)).await {
            Ok(Ok(())) => {
                log::info!("session {id}: delivered {} chars", processed.chars().count());
                self.status.set_ready(id, processed);
                self.status.release_after(id, READY_LINGER);
            }
            Ok(Err(e)) => self.fail(id, format!("delivery failed: {e}")),
            Err(e) => self.fail(id, format!("delivery task panicked: {e}")),
        }
    }

    fn fail(&self, id: u64, message: String) {
        self.status.set_error(id, message);
        self.status.release_after(id, ERROR_LINGER);
    }
}

impl SessionPipeline for PipelineRunner {
    fn spawn(&self, job: SessionJob) {
        let runner = self.clone();
        runner.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            runner.run(job).await;
            runner.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate a context snapshot to its first [`CONTEXT_MAX_CHARS`]
/// characters, respecting char boundaries.
fn truncate_context(context: &str) -> &str {
    match context.char_indices().nth(CONTEXT_MAX_CHARS) {
        Some((idx, _)) => &context[..idx],
        None => context,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::history::HistoryError;
    use crate::observer::ObserverBroadcast;
    use crate::output::DeliveryError;
    use crate::process::ProcessingError;
    use crate::session::state::new_shared_state;
    use crate::session::Phase;
    use crate::transcribe::TranscriptionError;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    struct FixedTranscriber(Result<String, ()>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(
            &self,
            _audio: Vec<u8>,
            _language: &str,
        ) -> Result<String, TranscriptionError> {
            self.0
                .clone()
                .map_err(|_| TranscriptionError::Timeout)
        }
    }

    /// Processor that records its inputs and prepends a marker.
    #[derive(Default)]
    struct RecordingProcessor {
        calls: Mutex<Vec<(ProcessingMode, Option<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl TextProcessor for RecordingProcessor {
        async fn process(
            &self,
            text: &str,
            mode: ProcessingMode,
            _vocabulary: &[String],
            context: Option<&str>,
        ) -> Result<String, ProcessingError> {
            self.calls
                .lock()
                .unwrap()
                .push((mode, context.map(str::to_string)));
            if self.fail {
                return Err(ProcessingError::EmptyResponse);
            }
            Ok(format!("processed: {text}"))
        }
    }

    #[derive(Default)]
    struct RecordingOutput {
        delivered: Mutex<Vec<String>>,
    }

    impl OutputSink for RecordingOutput {
        fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
            self.delivered.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn read_current(&self) -> Result<String, DeliveryError> {
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct RecordingHistory {
        entries: Mutex<Vec<HistoryEntry>>,
    }

    impl HistorySink for RecordingHistory {
        fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Rig {
        runner: PipelineRunner,
        status: StatusHandle,
        processor: Arc<RecordingProcessor>,
        output: Arc<RecordingOutput>,
        history: Arc<RecordingHistory>,
    }

    fn rig_with(transcriber: FixedTranscriber, processor: RecordingProcessor) -> Rig {
        let status = StatusHandle::new(
            new_shared_state(ProcessingMode::Full),
            ObserverBroadcast::start(Vec::new()),
        );
        let processor = Arc::new(processor);
        let output = Arc::new(RecordingOutput::default());
        let history = Arc::new(RecordingHistory::default());
        let runner = PipelineRunner::new(
            status.clone(),
            Arc::new(transcriber),
            Arc::clone(&processor) as Arc<dyn TextProcessor>,
            Arc::clone(&output) as Arc<dyn OutputSink>,
            Arc::clone(&history) as Arc<dyn HistorySink>,
            vec!["tokio".into()],
            "en".into(),
        );
        Rig {
            runner,
            status,
            processor,
            output,
            history,
        }
    }

    fn rig() -> Rig {
        rig_with(
            FixedTranscriber(Ok("hello world".into())),
            RecordingProcessor::default(),
        )
    }

    fn job(mode: ProcessingMode, context: Option<String>) -> SessionJob {
        SessionJob {
            id: 1,
            audio: vec![0; 64],
            context,
            mode,
        }
    }

    fn phase(rig: &Rig) -> Phase {
        rig.status.state().lock().unwrap().phase
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn full_session_processes_records_and_delivers() {
        let r = rig();
        r.runner.run(job(ProcessingMode::Full, None)).await;

        assert_eq!(phase(&r), Phase::Ready);
        assert_eq!(
            r.output.delivered.lock().unwrap().as_slice(),
            ["processed: hello world"]
        );

        let entries = r.history.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw, "hello world");
        assert_eq!(entries[0].processed, "processed: hello world");
        assert!(!entries[0].had_context);
    }

    #[tokio::test]
    async fn raw_mode_delivers_verbatim_without_processor() {
        let r = rig();
        r.runner.run(job(ProcessingMode::Raw, None)).await;

        assert!(r.processor.calls.lock().unwrap().is_empty());
        assert_eq!(
            r.output.delivered.lock().unwrap().as_slice(),
            ["hello world"]
        );
    }

    #[tokio::test]
    async fn empty_transcript_discards_quietly() {
        let r = rig_with(
            FixedTranscriber(Ok("   \n ".into())),
            RecordingProcessor::default(),
        );
        r.runner.run(job(ProcessingMode::Full, None)).await;

        assert_eq!(phase(&r), Phase::Idle);
        assert!(r.output.delivered.lock().unwrap().is_empty());
        assert!(r.history.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_empty_transcript_does_not_clobber_newer_session() {
        let r = rig_with(
            FixedTranscriber(Ok("".into())),
            RecordingProcessor::default(),
        );
        // Session 2 is already recording when session 1's slow transcription
        // comes back empty (toggle double-press).
        r.status.set(2, Phase::Recording);
        {
            let mut st = r.status.state().lock().unwrap();
            st.recording = true;
        }

        r.runner.run(job(ProcessingMode::Full, None)).await;

        let st = r.status.state().lock().unwrap();
        assert_eq!(st.phase, Phase::Recording);
        assert_eq!(st.phase_owner, 2);
    }

    #[tokio::test]
    async fn transcription_failure_enters_error_with_message() {
        let r = rig_with(
            FixedTranscriber(Err(())),
            RecordingProcessor::default(),
        );
        r.runner.run(job(ProcessingMode::Full, None)).await;

        assert_eq!(phase(&r), Phase::Error);
        let st = r.status.state().lock().unwrap();
        assert!(st
            .last_error
            .as_deref()
            .unwrap()
            .starts_with("transcription failed"));
    }

    #[tokio::test]
    async fn processing_failure_enters_error() {
        let r = rig_with(
            FixedTranscriber(Ok("hello".into())),
            RecordingProcessor {
                fail: true,
                ..Default::default()
            },
        );
        r.runner.run(job(ProcessingMode::Clean, None)).await;

        assert_eq!(phase(&r), Phase::Error);
        assert!(r.output.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn context_is_passed_through_and_truncated() {
        let r = rig();
        let long_context = "x".repeat(CONTEXT_MAX_CHARS + 500);
        r.runner
            .run(job(ProcessingMode::Tech, Some(long_context)))
            .await;

        let calls = r.processor.calls.lock().unwrap();
        assert_eq!(calls[0].0, ProcessingMode::Tech);
        assert_eq!(
            calls[0].1.as_ref().unwrap().chars().count(),
            CONTEXT_MAX_CHARS
        );
        assert!(r.history.entries.lock().unwrap()[0].had_context);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_linger_releases_back_to_idle() {
        let r = rig();
        r.runner.run(job(ProcessingMode::Full, None)).await;
        assert_eq!(phase(&r), Phase::Ready);

        tokio::time::sleep(READY_LINGER + Duration::from_millis(50)).await;
        assert_eq!(phase(&r), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_linger_does_not_clobber_newer_session() {
        let r = rig();
        r.runner.run(job(ProcessingMode::Full, None)).await;
        assert_eq!(phase(&r), Phase::Ready);

        // A newer session takes over before the linger expires.
        r.status.set(2, Phase::Recording);
        {
            let mut st = r.status.state().lock().unwrap();
            st.recording = true;
        }

        tokio::time::sleep(READY_LINGER + Duration::from_millis(50)).await;
        assert_eq!(phase(&r), Phase::Recording);
    }

    #[test]
    fn truncate_context_respects_char_boundaries() {
        let s = "é".repeat(CONTEXT_MAX_CHARS + 10);
        let t = truncate_context(&s);
        assert_eq!(t.chars().count(), CONTEXT_MAX_CHARS);

        let short = "short";
        assert_eq!(truncate_context(short), "short");
    }
}
