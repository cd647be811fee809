//! Error taxonomy shared by the moderation core.
//!
//! Handler-level errors never escape the dispatcher: endpoints in `main`
//! catch them, log, and keep serving other events. `InvalidDuration` and
//! `MissingReplyTarget` are user-input errors that the command dispatcher
//! converts into self-deleting syntax notices.

use thiserror::Error;

/// Errors produced by the moderation engine and its handlers.
#[derive(Debug, Error)]
pub enum ModError {
    /// Malformed duration token (purely numeric or unknown unit suffix).
    #[error("invalid duration token: {0:?}")]
    InvalidDuration(String),

    /// A command requiring a replied-to message was invoked without one.
    #[error("command requires a reply to a message")]
    MissingReplyTarget,

    /// Expected settings row absent where required. Every chat must have
    /// its settings seeded when the bot joins.
    #[error("no settings row for chat {0}")]
    DataIntegrity(i64),

    /// Telegram API call failed.
    #[error(transparent)]
    Platform(#[from] teloxide::RequestError),

    /// Attachment download failed.
    #[error(transparent)]
    Download(#[from] teloxide::DownloadError),

    /// Persistent store failure.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
