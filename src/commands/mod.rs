//! Command parsing, gating, and dispatch.
//!
//! Messages whose body starts with [`COMMAND_SIGIL`] are commands: the first
//! whitespace-delimited token (case-insensitive) names the command, the rest
//! are positional arguments. Dispatch gates on the store record, decides
//! whether to surface a presence indicator, resolves a handler from a closed
//! name set, and records usage only after the handler succeeds. Presence is
//! cleared as the final step no matter what happened.

/// Built-in command handlers.
pub mod handlers;

use crate::presence;
use crate::store::CommandStore;
use crate::transport::{Chat, InboundMessage};
use handlers::{CommandHandler, HelpHandler, ToggleAiHandler, ToggleCmdHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// Prefix marking a message body as a command.
pub const COMMAND_SIGIL: char = '!';

/// Reply for command names the store has never heard of.
pub const UNKNOWN_COMMAND_REPLY: &str = "Unknown command. Use !help to see available commands.";
/// Reply for commands that exist but are switched off.
pub const DISABLED_COMMAND_REPLY: &str = "This command is currently disabled.";
/// Reply for known commands without a registered handler.
pub const NOT_IMPLEMENTED_REPLY: &str = "This command is not implemented yet.";
/// Generic failure reply for errors during command execution.
pub const COMMAND_FAILURE_REPLY: &str = "Error executing command. Please try again later.";

/// The closed set of command names the bot knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// List available commands.
    Help,
    /// Flip the AI auto-reply flag.
    ToggleAi,
    /// Enable or disable another command.
    ToggleCmd,
    /// Show recent bot activity.
    Logs,
    /// Fetch a contact's profile picture.
    Pfp,
    /// Read a quoted message aloud.
    Speak,
    /// Generate an image from a prompt.
    Img,
    /// Relay a message to another number.
    Msg,
}

impl CommandName {
    /// Parses a lowercase command key into the closed set.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "help" => Some(Self::Help),
            "toggleai" => Some(Self::ToggleAi),
            "togglecmd" => Some(Self::ToggleCmd),
            "logs" => Some(Self::Logs),
            "pfp" => Some(Self::Pfp),
            "speak" => Some(Self::Speak),
            "img" => Some(Self::Img),
            "msg" => Some(Self::Msg),
            _ => None,
        }
    }

    /// Canonical name without the sigil.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::ToggleAi => "toggleai",
            Self::ToggleCmd => "togglecmd",
            Self::Logs => "logs",
            Self::Pfp => "pfp",
            Self::Speak => "speak",
            Self::Img => "img",
            Self::Msg => "msg",
        }
    }

    /// Whether the command produces audio (recording indicator instead of
    /// typing).
    #[must_use]
    pub const fn produces_audio(self) -> bool {
        matches!(self, Self::Speak)
    }
}

/// A sigil-stripped, tokenized command line.
#[derive(Debug)]
pub struct ParsedCommand<'a> {
    /// Lowercased command key.
    pub key: String,
    /// Positional arguments, in order.
    pub args: Vec<&'a str>,
}

/// Splits a command body into key and arguments. `None` if the body does not
/// start with the sigil.
#[must_use]
pub fn parse_command_line(body: &str) -> Option<ParsedCommand<'_>> {
    let rest = body.strip_prefix(COMMAND_SIGIL)?;
    let mut tokens = rest.split_whitespace();
    let key = tokens.next().unwrap_or("").to_lowercase();
    let args: Vec<&str> = tokens.collect();
    Some(ParsedCommand { key, args })
}

/// Static predicate: will this invocation visibly respond, so a presence
/// indicator is worth showing? Unrecognized commands never trigger one.
#[must_use]
pub fn will_respond(name: Option<CommandName>, args: &[&str], has_quoted_message: bool) -> bool {
    match name {
        Some(
            CommandName::Help | CommandName::ToggleAi | CommandName::ToggleCmd | CommandName::Logs,
        ) => true,
        Some(CommandName::Pfp) => !args.is_empty() || has_quoted_message,
        Some(CommandName::Speak) => has_quoted_message,
        Some(CommandName::Img) => !args.is_empty(),
        Some(CommandName::Msg) => args.len() >= 2,
        None => false,
    }
}

/// Routes parsed commands through the store and the handler table.
pub struct CommandDispatcher {
    store: Arc<dyn CommandStore>,
    registry: HashMap<CommandName, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    /// Creates a dispatcher with the built-in handlers registered.
    #[must_use]
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        let mut dispatcher = Self {
            store: Arc::clone(&store),
            registry: HashMap::new(),
        };
        dispatcher.register(
            CommandName::Help,
            Arc::new(HelpHandler::new(Arc::clone(&store))),
        );
        dispatcher.register(
            CommandName::ToggleAi,
            Arc::new(ToggleAiHandler::new(Arc::clone(&store))),
        );
        dispatcher.register(
            CommandName::ToggleCmd,
            Arc::new(ToggleCmdHandler::new(store)),
        );
        dispatcher
    }

    /// Registers (or replaces) the handler for a command name.
    pub fn register(&mut self, name: CommandName, handler: Arc<dyn CommandHandler>) {
        self.registry.insert(name, handler);
    }

    /// Runs one command message to completion. Errors are converted into a
    /// generic failure reply; presence is cleared afterwards regardless of
    /// outcome.
    pub async fn dispatch(&self, message: &dyn InboundMessage) {
        let chat = message.chat();
        if let Err(err) = self.run(message, chat.as_ref()).await {
            error!(error = %err, "error executing command");
            if let Err(send_err) = message.reply_text(COMMAND_FAILURE_REPLY).await {
                error!(error = %send_err, "failed to deliver command failure reply");
            }
        }
        presence::clear(chat.as_ref()).await;
    }

    async fn run(&self, message: &dyn InboundMessage, chat: &dyn Chat) -> anyhow::Result<()> {
        let Some(parsed) = parse_command_line(message.body()) else {
            return Ok(());
        };

        let Some(record) = self.store.find_command(&parsed.key).await? else {
            message.reply_text(UNKNOWN_COMMAND_REPLY).await?;
            return Ok(());
        };
        if !record.enabled {
            message.reply_text(DISABLED_COMMAND_REPLY).await?;
            return Ok(());
        }

        let name = CommandName::parse(&parsed.key);
        if will_respond(name, &parsed.args, message.has_quoted_message()) {
            if name.is_some_and(CommandName::produces_audio) {
                presence::set_recording(chat).await;
            } else {
                presence::set_typing(chat).await;
            }
        }

        let Some(handler) = name.and_then(|n| self.registry.get(&n)) else {
            message.reply_text(NOT_IMPLEMENTED_REPLY).await?;
            return Ok(());
        };

        handler.execute(message, &parsed.args).await?;
        // Usage is recorded only once the handler has completed.
        self.store.record_usage(&parsed.key).await?;
        Ok(())
    }
}
