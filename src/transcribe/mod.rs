//! Speech-to-text behind the [`Transcriber`] capability.
//!
//! [`ApiTranscriber`] posts the WAV take to any OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint (Groq, OpenAI, a local
//! faster-whisper server) as a multipart form.  All connection details come
//! from config; nothing is hardcoded, and the core never branches on which
//! provider is behind the URL.
//!
//! An empty transcript is *not* an error here — the pipeline treats it as a
//! soft miss (silence, breath noise) and returns the session to idle.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TranscriptionConfig;

// ---------------------------------------------------------------------------
// TranscriptionError
// ---------------------------------------------------------------------------

/// Errors from the transcription backend.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// HTTP transport or connection error.
    #[error("transcription request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("transcription request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse transcription response: {0}")]
    Parse(String),

    /// The endpoint answered with a non-success status.
    #[error("transcription endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranscriptionError::Timeout
        } else {
            TranscriptionError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Async capability turning captured audio into text.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn Transcriber>` across concurrent pipeline tasks.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV `audio`, hinting the primary speech `language`
    /// (ISO-639-1 code, e.g. `"en"`, `"pt"`).
    async fn transcribe(&self, audio: Vec<u8>, language: &str)
        -> Result<String, TranscriptionError>;
}

// ---------------------------------------------------------------------------
// ApiTranscriber
// ---------------------------------------------------------------------------

/// Whisper-style transcription over an OpenAI-compatible REST endpoint.
pub struct ApiTranscriber {
    client: reqwest::Client,
    config: TranscriptionConfig,
}

impl ApiTranscriber {
    /// Build an `ApiTranscriber` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is the last-resort fallback
    /// if the builder fails.
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for ApiTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let url = format!("{}/v1/audio/transcriptions", self.config.base_url);

        let file_part = reqwest::multipart::Part::bytes(audio)
            .file_name("capture.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("response_format", "json");

        if !language.is_empty() && language != "auto" {
            form = form.text("language", language.to_string());
        }

        let mut req = self.client.post(&url).multipart(form);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Parse(e.to_string()))?;

        let text = json["text"]
            .as_str()
            .ok_or_else(|| TranscriptionError::Parse("missing `text` field".into()))?
            .trim()
            .to_string();

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
