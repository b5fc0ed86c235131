//! Telegram implementation of the transport traits.
//!
//! Presence indicators map onto chat actions (`Typing` / `RecordVoice`),
//! replies quote the inbound message, and media delivery picks the send
//! method from the payload's content type.

use super::{Chat, InboundMessage, MediaPayload, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::payloads::{
    SendDocumentSetters, SendMessageSetters, SendPhotoSetters, SendVideoSetters,
    SendVoiceSetters,
};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, InputFile, Message, ReplyParameters};
use teloxide::RequestError;

fn map_error(err: RequestError) -> TransportError {
    match err {
        RequestError::Network(e) if e.is_timeout() => TransportError::Timeout(e.to_string()),
        RequestError::Network(e) => TransportError::Network(e.to_string()),
        RequestError::Io(e) => TransportError::Network(e.to_string()),
        e @ RequestError::RetryAfter(_) => TransportError::Network(e.to_string()),
        e => TransportError::Api(e.to_string()),
    }
}

/// [`Chat`] backed by a Telegram chat id.
pub struct TelegramChat {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramChat {
    /// Wraps a bot handle and a chat id.
    #[must_use]
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Chat for TelegramChat {
    async fn set_typing(&self) -> Result<(), TransportError> {
        self.bot
            .send_chat_action(self.chat_id, ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn set_recording(&self) -> Result<(), TransportError> {
        self.bot
            .send_chat_action(self.chat_id, ChatAction::RecordVoice)
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn clear_state(&self) -> Result<(), TransportError> {
        // Telegram chat actions expire server-side after a few seconds;
        // there is no API call to clear them early.
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.bot
            .send_message(self.chat_id, text)
            .await
            .map(|_| ())
            .map_err(map_error)
    }
}

/// [`InboundMessage`] wrapping one `teloxide` [`Message`].
pub struct TelegramMessage {
    bot: Bot,
    message: Message,
    body: String,
    sender: String,
}

impl TelegramMessage {
    /// Wraps an inbound Telegram message. The body is the text or, for
    /// media messages, the caption.
    #[must_use]
    pub fn new(bot: Bot, message: Message) -> Self {
        let body = message
            .text()
            .or_else(|| message.caption())
            .unwrap_or("")
            .to_owned();
        let sender = message
            .from
            .as_ref()
            .map_or_else(|| message.chat.id.to_string(), |user| user.id.to_string());
        Self {
            bot,
            message,
            body,
            sender,
        }
    }

    fn reply_params(&self) -> ReplyParameters {
        ReplyParameters::new(self.message.id)
    }
}

#[async_trait]
impl InboundMessage for TelegramMessage {
    fn body(&self) -> &str {
        &self.body
    }

    fn sender_id(&self) -> &str {
        &self.sender
    }

    fn has_quoted_message(&self) -> bool {
        self.message.reply_to_message().is_some()
    }

    fn chat(&self) -> Arc<dyn Chat> {
        Arc::new(TelegramChat::new(self.bot.clone(), self.message.chat.id))
    }

    async fn reply_text(&self, text: &str) -> Result<(), TransportError> {
        self.bot
            .send_message(self.message.chat.id, text)
            .reply_parameters(self.reply_params())
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn reply_media(
        &self,
        payload: &MediaPayload,
        as_voice: bool,
    ) -> Result<(), TransportError> {
        let chat_id = self.message.chat.id;
        let mut file = InputFile::memory(payload.data.clone());
        if let Some(name) = &payload.filename {
            file = file.file_name(name.clone());
        }

        let sent = if as_voice && payload.is_audio() {
            self.bot
                .send_voice(chat_id, file)
                .reply_parameters(self.reply_params())
                .await
        } else if payload.content_type.starts_with("image/") {
            self.bot
                .send_photo(chat_id, file)
                .reply_parameters(self.reply_params())
                .await
        } else if payload.content_type.starts_with("video/") {
            self.bot
                .send_video(chat_id, file)
                .reply_parameters(self.reply_params())
                .await
        } else {
            // Audio (unless explicitly voice) and everything else goes out
            // as a plain file.
            self.bot
                .send_document(chat_id, file)
                .reply_parameters(self.reply_params())
                .await
        };

        sent.map(|_| ()).map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_transient_network() {
        let mapped = map_error(RequestError::Io(std::io::Error::other("boom")));
        assert!(mapped.is_transient());
        assert!(matches!(mapped, TransportError::Network(_)));
    }

    #[test]
    fn rate_limits_map_to_transient_network() {
        let mapped = map_error(RequestError::RetryAfter(
            teloxide::types::Seconds::from_seconds(42),
        ));
        assert!(mapped.is_transient());
    }
}
