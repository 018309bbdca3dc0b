//! LLM text processing behind the [`TextProcessor`] capability.
//!
//! [`ApiProcessor`] calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint with a per-mode system prompt:
//!
//! | Mode  | Transform                                       |
//! |-------|-------------------------------------------------|
//! | raw   | passthrough (no API call)                       |
//! | clean | strip filler words, fix punctuation             |
//! | tech  | format technical terms using the vocabulary     |
//! | full  | clean + tech combined                           |
//!
//! When a non-empty context snapshot is supplied the context template is
//! used instead of the mode template — the spoken text is treated as an
//! instruction about the snapshot ("fix this error", "rewrite that"), and
//! the processor rewrites it with the referents resolved.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ProcessingConfig;
use crate::session::ProcessingMode;

// ---------------------------------------------------------------------------
// ProcessingError
// ---------------------------------------------------------------------------

/// Errors from the text-processing backend.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// HTTP transport or connection error.
    #[error("processing request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("processing request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse processing response: {0}")]
    Parse(String),

    /// The model returned a response with no usable text content.
    #[error("processing returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for ProcessingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProcessingError::Timeout
        } else {
            ProcessingError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// TextProcessor trait
// ---------------------------------------------------------------------------

/// Async capability transforming a raw transcript into delivered text.
#[async_trait]
pub trait TextProcessor: Send + Sync {
    /// Transform `text` according to `mode`, interpolating `vocabulary`
    /// terms into the prompt.  A non-empty `context` takes precedence over
    /// the mode-specific transform.
    async fn process(
        &self,
        text: &str,
        mode: ProcessingMode,
        vocabulary: &[String],
        context: Option<&str>,
    ) -> Result<String, ProcessingError>;
}

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

const PROMPT_CLEAN: &str = "\
Clean the text by removing filler words.

Remove: \"um\", \"uh\", \"ah\", \"like\", \"so\", \"you know\", \"kind of\", \"well\", \"anyway\", \"basically\"
Fix punctuation. Keep the meaning.

FORBIDDEN: do NOT write introductions such as \"Here is\" or \"The cleaned text is\". Answer ONLY with the cleaned text.

Text:";

const PROMPT_TECH: &str = "\
Format technical terms in the text.

Rules:
- Function names: getUserById, get_user_by_id
- Technologies: React, TypeScript, Python, FastAPI
- Vocabulary: {vocabulary}

FORBIDDEN: do NOT write introductions. Answer ONLY with the formatted text.

Text:";

const PROMPT_FULL: &str = "\
Correct the text, keeping the SAME LANGUAGE as the original.

RULES:
1. Remove fillers: \"um\", \"uh\", \"ah\", \"like\", \"so\", \"you know\", \"anyway\"
2. Fix punctuation
3. Format technical terms: React, TypeScript, Python, camelCase
4. Vocabulary: {vocabulary}
5. KEEP THE ORIGINAL LANGUAGE

FORBIDDEN:
- Do NOT translate
- Do NOT add introductions
- Do NOT explain
- Return ONLY the corrected text

Text:";

const PROMPT_CONTEXT: &str = "\
Rewrite the instruction, incorporating the context.

CONTEXT:
```
{context}
```

INSTRUCTION: {text}

Rewrite the instruction clearly, replacing \"this\" / \"that error\" / \"that code\" with the relevant content from the context.

FORBIDDEN: do NOT write introductions. Answer ONLY with the rewritten instruction.";

/// Build the mode-specific system prompt with the vocabulary interpolated.
fn mode_prompt(mode: ProcessingMode, vocabulary: &[String]) -> String {
    let template = match mode {
        ProcessingMode::Clean => PROMPT_CLEAN,
        ProcessingMode::Tech => PROMPT_TECH,
        // Raw never reaches the prompt builder; fall back to the full
        // template like an unknown mode would.
        ProcessingMode::Full | ProcessingMode::Raw => PROMPT_FULL,
    };

    let vocab = if vocabulary.is_empty() {
        "N/A".to_string()
    } else {
        vocabulary.join(", ")
    };

    template.replace("{vocabulary}", &vocab)
}

/// Build the context-injection system prompt.
fn context_prompt(text: &str, context: &str) -> String {
    PROMPT_CONTEXT
        .replace("{context}", context)
        .replace("{text}", text)
}

// ---------------------------------------------------------------------------
// ApiProcessor
// ---------------------------------------------------------------------------

/// Chat-completions text processor.
///
/// Works with Groq, OpenAI, Ollama (OpenAI mode), LM Studio — any provider
/// that speaks the chat-completions wire format.
pub struct ApiProcessor {
    client: reqwest::Client,
    config: ProcessingConfig,
}

impl ApiProcessor {
    /// Build an `ApiProcessor` from application config.
    pub fn from_config(config: &ProcessingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    async fn call_llm(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ProcessingError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user",   "content": user_message  }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  1024
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProcessingError::Parse(e.to_string()))?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ProcessingError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(ProcessingError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl TextProcessor for ApiProcessor {
    async fn process(
        &self,
        text: &str,
        mode: ProcessingMode,
        vocabulary: &[String],
        context: Option<&str>,
    ) -> Result<String, ProcessingError> {
        if text.is_empty() {
            return Ok(String::new());
        }

        if mode == ProcessingMode::Raw {
            return Ok(text.to_string());
        }

        // Context precedence: a non-empty snapshot switches to the
        // context-aware transform regardless of mode.
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            let prompt = context_prompt(text, ctx);
            return self.call_llm(&prompt, "Rewrite the instruction clearly.").await;
        }

        let prompt = mode_prompt(mode, vocabulary);
        self.call_llm(&prompt, text).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
