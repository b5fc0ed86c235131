//! Per-message classification and top-level error conversion.
//!
//! One message flows through exactly one of three paths: command dispatch,
//! media extraction, or an AI turn. Failures are caught here and converted
//! into a generic user-facing reply plus a log entry; they never reach the
//! scheduler loop.

use crate::ai::AiBackend;
use crate::commands::{CommandDispatcher, COMMAND_SIGIL};
use crate::media::{MediaOrchestrator, MediaOutcome};
use crate::presence;
use crate::session::{Role, SessionStore};
use crate::store::CommandStore;
use crate::transport::InboundMessage;
use std::sync::Arc;
use tracing::{debug, error};

/// Generic failure reply for errors during message processing.
pub const GENERIC_FAILURE_REPLY: &str = "Sorry, there was an error processing your message.";
/// Sent instead of the reply text when the backend ends the conversation.
pub const FAREWELL_REPLY: &str = "Alright, talk to you later!";

/// Routes one message to the command, media, or AI path.
pub struct MessagePipeline {
    dispatcher: CommandDispatcher,
    media: MediaOrchestrator,
    ai: Arc<dyn AiBackend>,
    store: Arc<dyn CommandStore>,
    sessions: SessionStore,
}

impl MessagePipeline {
    /// Assembles a pipeline from its components.
    #[must_use]
    pub fn new(
        dispatcher: CommandDispatcher,
        media: MediaOrchestrator,
        ai: Arc<dyn AiBackend>,
        store: Arc<dyn CommandStore>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            dispatcher,
            media,
            ai,
            store,
            sessions,
        }
    }

    /// Processes one message to completion, catching every failure.
    pub async fn process(&self, message: Arc<dyn InboundMessage>) {
        if let Err(err) = self.route(&message).await {
            error!(error = %err, "error processing message");
            if let Err(send_err) = message.reply_text(GENERIC_FAILURE_REPLY).await {
                error!(error = %send_err, "failed to deliver failure reply");
            }
            presence::clear(message.chat().as_ref()).await;
        }
    }

    async fn route(&self, message: &Arc<dyn InboundMessage>) -> anyhow::Result<()> {
        if message.body().starts_with(COMMAND_SIGIL) {
            // The dispatcher handles its own failures and presence cleanup.
            self.dispatcher.dispatch(message.as_ref()).await;
            return Ok(());
        }

        let chat = message.chat();
        match self.media.handle(Arc::clone(message)).await {
            MediaOutcome::Delivered { url } => {
                debug!(url = %url, "media delivered");
                presence::clear(chat.as_ref()).await;
                return Ok(());
            }
            MediaOutcome::Failed { url } => {
                debug!(url = %url, "media processing failed");
                presence::clear(chat.as_ref()).await;
                return Ok(());
            }
            MediaOutcome::NotDetected => {}
        }

        if self.store.ai_enabled().await? {
            presence::set_typing(chat.as_ref()).await;
            self.ai_turn(message.as_ref()).await?;
        }

        presence::clear(chat.as_ref()).await;
        Ok(())
    }

    async fn ai_turn(&self, message: &dyn InboundMessage) -> anyhow::Result<()> {
        let sender = message.sender_id();
        let history = self.sessions.history(sender).await;
        let reply = self.ai.generate(message.body(), &history).await?;

        self.sessions.push_turn(sender, Role::User, message.body()).await;
        self.sessions.push_turn(sender, Role::Model, &reply.text).await;
        if let Some(command) = &reply.command {
            // Suggestions are surfaced in logs only, never auto-executed.
            debug!(command = %command, "backend suggested a command");
        }

        let chat = message.chat();
        if reply.terminate {
            self.sessions.deactivate(sender).await;
            chat.send_text(FAREWELL_REPLY).await?;
        } else {
            self.sessions.mark_active(sender).await;
            chat.send_text(&reply.text).await?;
        }
        Ok(())
    }
}
