//! **Remote dispatch**: One user message to the assistant, one structured reply back.
//!
//! Stateless: exactly one request per call, no retry, no cache.

use crate::api::{ApiEnvelope, REQUEST_FAILED};
use crate::message::MessageCategory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Presentation category derived from the assistant's `action` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCategory {
    Appointment,
    Availability,
}

impl ReplyCategory {
    /// `None` for unknown or absent actions; the reply is then plain text.
    pub fn from_action(action: &str) -> Option<Self> {
        match action.trim().to_ascii_lowercase().as_str() {
            "appointment" | "schedule" | "list_appointments" | "update" | "cancel" => {
                Some(ReplyCategory::Appointment)
            }
            "availability" | "check_availability" => Some(ReplyCategory::Availability),
            _ => None,
        }
    }
}

impl From<ReplyCategory> for MessageCategory {
    fn from(category: ReplyCategory) -> Self {
        match category {
            ReplyCategory::Appointment => MessageCategory::Appointment,
            ReplyCategory::Availability => MessageCategory::Availability,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub reply_text: String,
    pub category: Option<ReplyCategory>,
    /// Structured payload the assistant attached (created appointment, slots...).
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// The assistant reported a failure. `reason` is its error text, if it gave one.
    #[error("assistant error: {}", reason.as_deref().unwrap_or("(no reason given)"))]
    Remote { reason: Option<String> },

    /// Network, timeout or undecodable response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    /// Text for the error message in the transcript, if the failure carries a usable one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            DispatchError::Remote { reason } => reason.as_deref(),
            DispatchError::Transport(detail) => Some(detail.as_str()),
        }
        .map(str::trim)
        .filter(|r| !r.is_empty())
    }
}

/// Anything that can answer a user message.
#[async_trait]
pub trait AssistantDispatch: Send + Sync {
    async fn send(&self, text: &str) -> Result<AssistantReply, DispatchError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatData {
    reply: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// HTTP client for `POST {base}/chat`.
#[derive(Debug, Clone)]
pub struct HttpAssistantClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAssistantClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AssistantDispatch for HttpAssistantClient {
    async fn send(&self, text: &str) -> Result<AssistantReply, DispatchError> {
        let url = format!("{}/chat", self.base_url);
        debug!(%url, chars = text.len(), "dispatching message");

        let res = self
            .client
            .post(&url)
            .json(&ChatRequest { message: text })
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        // Error statuses usually still carry the envelope; prefer its error text.
        let envelope: ApiEnvelope<ChatData> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(DispatchError::Transport(format!("invalid response: {}", e)));
            }
            Err(_) => {
                warn!(%status, "assistant returned a non-envelope error body");
                return Err(DispatchError::Remote {
                    reason: Some(REQUEST_FAILED.to_string()),
                });
            }
        };

        if !status.is_success() {
            let reason = envelope.reason().unwrap_or(REQUEST_FAILED).to_string();
            warn!(%status, %reason, "assistant request failed");
            return Err(DispatchError::Remote {
                reason: Some(reason),
            });
        }
        if !envelope.success {
            let reason = envelope.reason().map(str::to_string);
            warn!(%status, ?reason, "assistant reported failure");
            return Err(DispatchError::Remote { reason });
        }

        let data = envelope.data.ok_or(DispatchError::Remote { reason: None })?;
        Ok(AssistantReply {
            category: data.action.as_deref().and_then(ReplyCategory::from_action),
            reply_text: data.reply,
            data: data.data,
        })
    }
}
