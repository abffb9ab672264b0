//! Narrative generation seam and the OpenAI Responses API adapter.
//!
//! Business code only sees [`NarrativeGenerator`]: a system instruction plus a
//! JSON payload in, Markdown out. Everything about the remote response shape
//! stays inside [`OpenAiNarrator`].

use async_trait::async_trait;
use eod_common::NarrativeConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a generation attempt produced nothing usable.
#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("API error: HTTP {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Empty response")]
    Empty,

    #[error("OPENAI_API_KEY is not set")]
    MissingKey,

    #[error("Invalid client setup: {0}")]
    InvalidSetup(String),
}

/// Produces Markdown prose from a structured payload.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, system: &str, payload: &Value) -> Result<String, NarrativeError>;
}

// ============================================================================
// OpenAI Adapter
// ============================================================================

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    max_output_tokens: u32,
    input: Vec<InputMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: String,
}

/// Narrative generator backed by the OpenAI Responses API.
pub struct OpenAiNarrator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_output_tokens: u32,
}

impl OpenAiNarrator {
    pub fn new(api_key: &str, config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            NarrativeError::InvalidSetup("API key is not a valid header value".into())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NarrativeError::InvalidSetup(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Build from config; fails when no usable API key is configured.
    pub fn from_config(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let key = config.api_key().ok_or(NarrativeError::MissingKey)?;
        Self::new(key, config)
    }
}

/// Pull text out of whichever response layout the API returned.
///
/// Checked in order: a top-level `output_text`, the concatenated
/// `output[].content[].text` parts, then a chat-style
/// `choices[0].message.content`.
pub(crate) fn extract_text(body: &Value) -> Option<String> {
    let non_blank = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());

    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        if let Some(text) = non_blank(text) {
            return Some(text);
        }
    }

    if let Some(items) = body.get("output").and_then(Value::as_array) {
        let joined: String = items
            .iter()
            .filter_map(|item| item.get("content").and_then(Value::as_array))
            .flatten()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");
        if let Some(text) = non_blank(&joined) {
            return Some(text);
        }
    }

    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .and_then(non_blank)
}

#[async_trait]
impl NarrativeGenerator for OpenAiNarrator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, system: &str, payload: &Value) -> Result<String, NarrativeError> {
        let url = format!("{}/v1/responses", self.base_url);
        let user = serde_json::to_string(payload)
            .map_err(|e| NarrativeError::Malformed(format!("payload: {}", e)))?;

        let request = ResponsesRequest {
            model: &self.model,
            max_output_tokens: self.max_output_tokens,
            input: vec![
                InputMessage {
                    role: "system",
                    content: system.to_string(),
                },
                InputMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        debug!(url = %url, model = %self.model, "Requesting narrative");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NarrativeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NarrativeError::Malformed(e.to_string()))?;

        extract_text(&body).ok_or(NarrativeError::Empty)
    }
}
