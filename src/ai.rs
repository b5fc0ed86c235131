//! Generative-AI backend client.
//!
//! The backend is asked for JSON-mode replies and must answer with a single
//! object `{"text": ..., "command": ..., "terminate": ...}`; anything else is
//! treated as a backend failure, never passed through to the user.

use crate::config::{self, Settings};
use crate::session::Turn;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// AI backend failures.
#[derive(Debug, Error)]
pub enum AiError {
    /// Connectivity failure or timeout talking to the backend.
    #[error("ai backend network error: {0}")]
    Network(String),
    /// The backend answered with a non-success status.
    #[error("ai backend api error: {0}")]
    Api(String),
    /// The backend's output did not follow the reply contract.
    #[error("malformed ai reply: {0}")]
    MalformedReply(String),
}

/// Structured reply produced by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AiReply {
    /// Reply text to send to the user.
    pub text: String,
    /// Optional bot command the backend suggests running.
    #[serde(default)]
    pub command: Option<String>,
    /// Whether the conversation should end after this reply.
    #[serde(default)]
    pub terminate: bool,
}

/// Capability for generating one conversational reply.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Generates a reply to `user_text` given the prior `history`.
    async fn generate(&self, user_text: &str, history: &[Turn]) -> Result<AiReply, AiError>;
}

const SYSTEM_PROMPT: &str = "You are a casual, witty chat assistant with a \
light sarcastic streak. Keep replies short and conversational (one or two \
sentences), match the language of the user's message, and never be formal or \
robotic. Always answer with a single JSON object of the form \
{\"text\": \"<your reply>\", \"command\": null or a bot command string such \
as \"!img horse\", \"terminate\": true or false}. Set terminate to true only \
when the user is clearly done talking.";

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Builds a client from the loaded settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config::AI_HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: "https://generativelanguage.googleapis.com".to_owned(),
            api_key: settings.gemini_api_key.clone(),
            model: settings.gemini_model.clone(),
        }
    }

    /// Points the client at a different API host. Used by tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, user_text: &str, history: &[Turn]) -> Value {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.as_str(),
                    "parts": [{ "text": turn.text }],
                })
            })
            .collect();
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": user_text }],
        }));

        json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": contents,
            "generationConfig": {
                "temperature": 1.0,
                "maxOutputTokens": 1024,
                "responseMimeType": "application/json",
            },
        })
    }
}

pub(crate) fn parse_reply(text: &str) -> Result<AiReply, AiError> {
    serde_json::from_str(text).map_err(|err| AiError::MalformedReply(err.to_string()))
}

#[async_trait]
impl AiBackend for GeminiClient {
    async fn generate(&self, user_text: &str, history: &[Turn]) -> Result<AiReply, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self
            .http
            .post(&url)
            .json(&self.request_body(user_text, history))
            .send()
            .await
            .map_err(|err| AiError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Api(format!("status {status}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|err| AiError::MalformedReply(err.to_string()))?;
        let text = value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| AiError::MalformedReply("missing candidate text".to_owned()))?;

        parse_reply(text)
    }
}
