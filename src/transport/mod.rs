//! Transport capability traits.
//!
//! The pipeline never talks to a chat platform directly; it sees inbound
//! messages and chats through these object-safe traits so that adapters (and
//! test doubles) can be swapped in freely. The concrete Telegram adapter
//! lives in [`telegram`].

/// Telegram adapter over `teloxide`.
pub mod telegram;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport call timed out.
    #[error("transport timeout: {0}")]
    Timeout(String),
    /// Connectivity-level failure (DNS, reset, rate limiting).
    #[error("transport network error: {0}")]
    Network(String),
    /// The platform rejected the request.
    #[error("transport api error: {0}")]
    Api(String),
    /// The platform could not evaluate the payload. Never retried.
    #[error("payload evaluation failed: {0}")]
    Evaluation(String),
}

impl TransportError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// `Evaluation` failures are the documented non-retryable case: the
    /// payload itself is the problem, not the connection.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

/// One downloadable media item, ready for delivery.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    /// MIME type as reported by the origin server.
    pub content_type: String,
    /// Raw payload bytes.
    pub data: Bytes,
    /// Optional filename to attach on delivery.
    pub filename: Option<String>,
}

impl MediaPayload {
    /// Whether the payload carries audio content.
    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.content_type.starts_with("audio/")
    }
}

/// Handle for one conversation: presence transitions and outbound sends.
#[async_trait]
pub trait Chat: Send + Sync {
    /// Shows the "typing..." indicator to the remote party.
    async fn set_typing(&self) -> Result<(), TransportError>;
    /// Shows the "recording audio" indicator to the remote party.
    async fn set_recording(&self) -> Result<(), TransportError>;
    /// Clears any visible activity indicator.
    async fn clear_state(&self) -> Result<(), TransportError>;
    /// Sends a plain text message into the chat.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;
}

/// One inbound chat message. Owned by the transport; the pipeline only
/// borrows it for the duration of processing.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    /// Message body text (may be empty).
    fn body(&self) -> &str;
    /// Stable identity of the sender, used as the session key.
    fn sender_id(&self) -> &str;
    /// Whether this message quotes another message.
    fn has_quoted_message(&self) -> bool;
    /// The chat this message arrived in.
    fn chat(&self) -> Arc<dyn Chat>;
    /// Replies to this message with text.
    async fn reply_text(&self, text: &str) -> Result<(), TransportError>;
    /// Replies to this message with a media payload. `as_voice` asks the
    /// transport to render audio as a voice note instead of a file.
    async fn reply_media(&self, payload: &MediaPayload, as_voice: bool)
        -> Result<(), TransportError>;
}
