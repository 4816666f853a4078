//! LLM Client: the single point of entry for all Gemini API calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! Generation code talks to `dyn ModelBackend`; `GeminiClient` is the
//! production implementation.
//!
//! The client never retries. Model fallback and quota pacing are owned by
//! `generation::fallback`.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub mod stub;

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport or decode failure. The request URL is stripped.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gemini API key not configured")]
    MissingApiKey,

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.without_url())
    }
}

/// A text-generation backend addressed by model name.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Whether the backend holds the credential it needs to be called at all.
    fn is_configured(&self) -> bool {
        true
    }

    /// Sends `prompt` to `model` and returns the raw generated text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    pub usage: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_tokens: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub output_tokens: u32,
}

impl GenerateContentResponse {
    /// Extracts the text of the first part of the first candidate.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.iter().find_map(|p| p.text.as_deref()))
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

/// Wraps the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let request_body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "Gemini call succeeded: model={model}, prompt_tokens={}, output_tokens={}",
                usage.prompt_tokens, usage.output_tokens
            );
        }

        parsed
            .text()
            .map(|t| t.to_string())
            .ok_or(LlmError::EmptyContent)
    }
}

/// Builds a readable error message from a Gemini error body.
///
/// A `RetryInfo.retryDelay` found in the details is kept in the message so
/// quota classification can honour it.
fn api_error_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<GeminiError>(body) else {
        return body.to_string();
    };

    let retry_delay = parsed
        .error
        .details
        .iter()
        .find_map(|d| d.get("retryDelay").and_then(|v| v.as_str()));

    match retry_delay {
        Some(delay) => format!("{} (retryDelay: \"{delay}\")", parsed.error.message),
        None => parsed.error.message,
    }
}
