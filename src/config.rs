//! Configuration and settings management
//!
//! Loads settings from environment variables and defines moderation policy
//! constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Telegram ID of the bot owner; only the owner may broadcast
    pub owner_id: Option<i64>,

    /// Channel receiving `!sd_ch` broadcasts
    pub channel_id: Option<i64>,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            // try_parsing lets numeric fields come from env strings
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Also add settings from environment variables directly (without prefix)
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true).try_parsing(true))
            .build()?;

        s.try_deserialize()
    }
}

/// Fallback rate for plain messages, calls per second
pub const DEFAULT_MESSAGE_RATE: f64 = 10.0;
/// Throttle key for plain messages without a matched handler
pub const DEFAULT_MESSAGE_KEY: &str = "message";
/// Rate for moderation commands, calls per second
pub const COMMAND_RATE: f64 = 0.5;
/// Rate for settings button presses, calls per second
pub const CALLBACK_RATE: f64 = 2.0;
/// Throttle key for settings button presses
pub const CALLBACK_KEY: &str = "settings_callback";
/// Rate for the unknown-command filter, calls per second
pub const COMMAND_FILTER_RATE: f64 = 1.0;
/// Throttle key for the unknown-command filter
pub const COMMAND_FILTER_KEY: &str = "command_filter";

/// How long a flooding user is restricted, minutes
pub const FLOOD_RESTRICTION_MINUTES: i64 = 10;
/// Streak values above this mean the user is already restricted and no new
/// restriction is issued for the event
pub const FLOOD_MAX_ACTIONED_STREAK: u32 = 2;

/// Throttle keys idle longer than this are evicted
pub const THROTTLE_IDLE_EVICT_SECS: u64 = 3600;
/// Interval between eviction sweeps
pub const THROTTLE_SWEEP_SECS: u64 = 600;

/// Inclusive bounds for the per-chat `max_warnings` setting
pub const MAX_WARNINGS_BOUNDS: std::ops::RangeInclusive<i32> = 1..=10;

/// Abandoned configuration dialogues expire after this many seconds
pub const DIALOGUE_TIMEOUT_SECS: u64 = 600;

/// Expected file name for the forbidden-word list attachment
pub const WORDLIST_FILE_NAME: &str = "banned-words";
/// Size ceiling for the forbidden-word list attachment, bytes
pub const WORDLIST_MAX_BYTES: u32 = 4 * 1024 * 1024;

/// Welcome message stored when the toggle switches the greeting on
pub const DEFAULT_WELCOME_MESSAGE: &str = "Привет, {name}";
/// Members joining with names longer than this are removed
pub const NAME_LENGTH_LIMIT: usize = 35;

/// Self-deleting notice delay for short commands, seconds
pub const NOTICE_DELAY_SHORT_SECS: u64 = 10;
/// Self-deleting notice delay for ban/mute syntax errors, seconds
pub const NOTICE_DELAY_LONG_SECS: u64 = 15;

/// Restrictions are capped at ten years; Telegram treats anything longer
/// than 366 days as forever anyway
pub const MAX_RESTRICTION_MINUTES: i64 = 60 * 24 * 366 * 10;

/// Initial backoff for Telegram file download retries, milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram file download retries, milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum retry attempts for Telegram file downloads
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
