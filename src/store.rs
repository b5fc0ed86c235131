//! Command/settings store capability.
//!
//! The dispatcher consumes the store through [`CommandStore`]; the store owns
//! command records and the AI auto-reply flag. Usage counters are updated via
//! an atomic increment operation rather than read-modify-write at the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation.
    #[error("store backend error: {0}")]
    Backend(String),
    /// Usage was recorded against a command that does not exist.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Persistent metadata for one bot command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Unique command name, lowercase, without the sigil.
    pub name: String,
    /// Whether the command may currently be invoked.
    pub enabled: bool,
    /// How many times the command completed successfully.
    pub usage_count: u64,
    /// When the command last completed successfully.
    pub last_used: Option<DateTime<Utc>>,
}

/// Capability for command lookup, usage accounting, and feature flags.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Looks up a command record by exact name.
    async fn find_command(&self, name: &str) -> Result<Option<CommandRecord>, StoreError>;
    /// Lists all known commands, sorted by name.
    async fn list_commands(&self) -> Result<Vec<CommandRecord>, StoreError>;
    /// Atomically increments a command's usage counter and stamps the time.
    async fn record_usage(&self, name: &str) -> Result<(), StoreError>;
    /// Enables or disables a command.
    async fn set_command_enabled(&self, name: &str, enabled: bool) -> Result<(), StoreError>;
    /// Whether AI auto-replies to free-text messages are on.
    async fn ai_enabled(&self) -> Result<bool, StoreError>;
    /// Flips the AI auto-reply flag.
    async fn set_ai_enabled(&self, enabled: bool) -> Result<(), StoreError>;
}

/// In-memory [`CommandStore`] implementation.
pub struct MemoryStore {
    commands: Mutex<HashMap<String, CommandRecord>>,
    ai_enabled: AtomicBool,
}

/// Commands known to the bot out of the box.
pub const DEFAULT_COMMANDS: &[&str] = &[
    "help", "toggleai", "togglecmd", "logs", "pfp", "speak", "img", "msg",
];

impl MemoryStore {
    /// Creates an empty store with AI auto-reply off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(HashMap::new()),
            ai_enabled: AtomicBool::new(false),
        }
    }

    /// Creates a store seeded with [`DEFAULT_COMMANDS`], all enabled.
    #[must_use]
    pub fn with_default_commands() -> Self {
        let mut commands = HashMap::new();
        for name in DEFAULT_COMMANDS {
            commands.insert(
                (*name).to_owned(),
                CommandRecord {
                    name: (*name).to_owned(),
                    enabled: true,
                    usage_count: 0,
                    last_used: None,
                },
            );
        }
        Self {
            commands: Mutex::new(commands),
            ai_enabled: AtomicBool::new(false),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn find_command(&self, name: &str) -> Result<Option<CommandRecord>, StoreError> {
        Ok(self.commands.lock().await.get(name).cloned())
    }

    async fn list_commands(&self) -> Result<Vec<CommandRecord>, StoreError> {
        let mut records: Vec<CommandRecord> =
            self.commands.lock().await.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn record_usage(&self, name: &str) -> Result<(), StoreError> {
        let mut commands = self.commands.lock().await;
        let record = commands
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownCommand(name.to_owned()))?;
        record.usage_count += 1;
        record.last_used = Some(Utc::now());
        Ok(())
    }

    async fn set_command_enabled(&self, name: &str, enabled: bool) -> Result<(), StoreError> {
        let mut commands = self.commands.lock().await;
        let record = commands
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownCommand(name.to_owned()))?;
        record.enabled = enabled;
        Ok(())
    }

    async fn ai_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.ai_enabled.load(Ordering::Relaxed))
    }

    async fn set_ai_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.ai_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }
}
