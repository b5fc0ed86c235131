//! Configuration and settings management
//!
//! Loads settings from environment variables and config files, and defines
//! the tuning constants for the message pipeline.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Gemini API key
    pub gemini_api_key: String,

    /// Gemini model used for auto-replies
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Endpoint of the media extraction API
    #[serde(default = "default_extractor_url")]
    pub extractor_url: String,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_owned()
}

fn default_extractor_url() -> String {
    "https://api.cobalt.tools/".to_owned()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let loaded = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        loaded.try_deserialize()
    }
}

/// Hard per-call timeout for extraction and download requests.
pub const PROCESSING_TIMEOUT: Duration = Duration::from_secs(60);
/// HTTP client timeout for plain media downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Retry attempts for network-facing media operations.
pub const MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff between retries.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(2000);
/// Largest media payload we will download (50 MB).
pub const MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// Interval between queue drain cycles.
pub const QUEUE_DRAIN_INTERVAL: Duration = Duration::from_millis(1000);
/// Idle AI sessions are evicted after this long.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);
/// Upper bound on concurrently tracked AI sessions.
pub const SESSION_MAX_ENTRIES: u64 = 10_000;
/// Per-user conversation history cap, in turns.
pub const HISTORY_MAX_TURNS: usize = 40;
/// Timeout for AI backend calls.
pub const AI_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
