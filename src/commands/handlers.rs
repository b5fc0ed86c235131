//! Built-in command handlers.
//!
//! Each handler implements the [`CommandHandler`] capability: it receives the
//! inbound message and the positional arguments and performs its side
//! effects. Handlers reply themselves; the dispatcher only records usage and
//! cleans up presence afterwards.

use crate::store::CommandStore;
use crate::transport::InboundMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Capability implemented by every command handler.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Executes the command.
    ///
    /// # Errors
    ///
    /// Any error is converted by the dispatcher into a generic failure reply
    /// and suppresses the usage increment.
    async fn execute(&self, message: &dyn InboundMessage, args: &[&str]) -> anyhow::Result<()>;
}

/// `!help`: lists known commands and their enabled state.
pub struct HelpHandler {
    store: Arc<dyn CommandStore>,
}

impl HelpHandler {
    /// Creates the handler over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn execute(&self, message: &dyn InboundMessage, _args: &[&str]) -> anyhow::Result<()> {
        let commands = self.store.list_commands().await?;
        let mut lines = vec!["Available commands:".to_owned()];
        for record in commands {
            let marker = if record.enabled { "" } else { " (disabled)" };
            lines.push(format!("!{}{marker}", record.name));
        }
        message.reply_text(&lines.join("\n")).await?;
        Ok(())
    }
}

/// `!toggleai`: flips the AI auto-reply flag.
pub struct ToggleAiHandler {
    store: Arc<dyn CommandStore>,
}

impl ToggleAiHandler {
    /// Creates the handler over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CommandHandler for ToggleAiHandler {
    async fn execute(&self, message: &dyn InboundMessage, _args: &[&str]) -> anyhow::Result<()> {
        let enabled = !self.store.ai_enabled().await?;
        self.store.set_ai_enabled(enabled).await?;
        let state = if enabled { "enabled" } else { "disabled" };
        message
            .reply_text(&format!("AI auto-reply is now {state}."))
            .await?;
        Ok(())
    }
}

/// `!togglecmd <name>`: enables or disables another command.
pub struct ToggleCmdHandler {
    store: Arc<dyn CommandStore>,
}

impl ToggleCmdHandler {
    /// Creates the handler over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CommandHandler for ToggleCmdHandler {
    async fn execute(&self, message: &dyn InboundMessage, args: &[&str]) -> anyhow::Result<()> {
        let Some(name) = args.first() else {
            message.reply_text("Usage: !togglecmd <command>").await?;
            return Ok(());
        };
        let name = name.to_lowercase();
        match self.store.find_command(&name).await? {
            None => {
                message
                    .reply_text(&format!("No such command: {name}"))
                    .await?;
            }
            Some(record) => {
                let enabled = !record.enabled;
                self.store.set_command_enabled(&name, enabled).await?;
                let state = if enabled { "enabled" } else { "disabled" };
                message
                    .reply_text(&format!("Command !{name} is now {state}."))
                    .await?;
            }
        }
        Ok(())
    }
}
