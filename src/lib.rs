//! chat-warden - Telegram group moderation bot
//!
//! Tracks per-user warnings with escalation to temporary restrictions,
//! rate-limits message and button-press floods, filters forbidden words
//! and walks chat admins through multi-step policy configuration.

/// Telegram handlers: commands, callbacks, keyboards and response templates
pub mod bot;
/// Configuration management
pub mod config;
/// Per-(chat, user) configuration dialogue state
pub mod dialogue;
/// Human-entered duration token parsing
pub mod duration;
/// Error taxonomy
pub mod error;
/// Moderation policies: anti-flood, warn escalation, word filter
pub mod moderation;
/// Persistent store (PostgreSQL) for chat settings and warn records
pub mod store;
/// Keyed rate limiting
pub mod throttle;
/// Delayed cleanup and resilient download helpers
pub mod utils;
