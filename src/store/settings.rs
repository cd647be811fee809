//! Chat settings rows: warn thresholds, forbidden words, welcome message.
//!
//! A row is seeded when the bot joins a chat and mutated only through the
//! settings keyboard or the configuration dialogue.

use std::collections::HashSet;

use sqlx::FromRow;
use tracing::info;

use crate::store::Database;

/// Full settings row for one chat.
#[derive(Debug, Clone, FromRow)]
pub struct ChatSettings {
    pub chat_id: i64,
    /// Warnings before escalation, kept within `[1, 10]`
    pub max_warnings: i32,
    /// How long an escalated user is muted
    pub restriction_minutes: i64,
    /// Comma-separated forbidden words, `NULL` when unset
    pub forbidden_words: Option<String>,
    pub auto_warn: bool,
    /// Greeting for joining members, `NULL` when disabled
    pub welcome_message: Option<String>,
}

impl ChatSettings {
    /// Forbidden words as a lowercase set.
    #[must_use]
    pub fn forbidden_set(&self) -> HashSet<String> {
        self.forbidden_words
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(|word| word.trim().to_lowercase())
                    .filter(|word| !word.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The subset of settings the warn flow needs.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct WarnPolicy {
    pub max_warnings: i32,
    pub restriction_minutes: i64,
}

/// Insert a fresh settings row for a chat.
///
/// Re-adding the bot to a chat hits the primary key; the unique violation
/// is logged and swallowed so the original settings survive.
pub async fn seed_chat(db: &Database, chat_id: i64) -> Result<(), sqlx::Error> {
    let res = sqlx::query("INSERT INTO chat_settings (chat_id) VALUES ($1)")
        .bind(chat_id)
        .execute(db.pool())
        .await;
    match res {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            info!("settings row for chat {chat_id} already exists");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

pub async fn fetch_settings(
    db: &Database,
    chat_id: i64,
) -> Result<Option<ChatSettings>, sqlx::Error> {
    sqlx::query_as(
        "SELECT chat_id, max_warnings, restriction_minutes, forbidden_words, auto_warn, \
         welcome_message FROM chat_settings WHERE chat_id = $1",
    )
    .bind(chat_id)
    .fetch_optional(db.pool())
    .await
}

pub async fn warn_policy(db: &Database, chat_id: i64) -> Result<Option<WarnPolicy>, sqlx::Error> {
    sqlx::query_as("SELECT max_warnings, restriction_minutes FROM chat_settings WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_optional(db.pool())
        .await
}

/// Welcome message for a chat; `None` when the chat has no row or the
/// greeting is disabled.
pub async fn welcome_message(db: &Database, chat_id: i64) -> Result<Option<String>, sqlx::Error> {
    let row: Option<Option<String>> =
        sqlx::query_scalar("SELECT welcome_message FROM chat_settings WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(db.pool())
            .await?;
    Ok(row.flatten())
}

pub async fn update_max_warnings(
    db: &Database,
    chat_id: i64,
    value: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE chat_settings SET max_warnings = $1 WHERE chat_id = $2")
        .bind(value)
        .bind(chat_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

pub async fn toggle_auto_warn(db: &Database, chat_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE chat_settings SET auto_warn = NOT auto_warn WHERE chat_id = $1")
        .bind(chat_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

pub async fn update_welcome_message(
    db: &Database,
    chat_id: i64,
    message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE chat_settings SET welcome_message = $1 WHERE chat_id = $2")
        .bind(message)
        .bind(chat_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

pub async fn update_forbidden_words(
    db: &Database,
    chat_id: i64,
    words: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE chat_settings SET forbidden_words = $1 WHERE chat_id = $2")
        .bind(words)
        .bind(chat_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

pub async fn update_restriction_minutes(
    db: &Database,
    chat_id: i64,
    minutes: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE chat_settings SET restriction_minutes = $1 WHERE chat_id = $2")
        .bind(minutes)
        .bind(chat_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(words: Option<&str>) -> ChatSettings {
        ChatSettings {
            chat_id: 1,
            max_warnings: 3,
            restriction_minutes: 7200,
            forbidden_words: words.map(str::to_string),
            auto_warn: true,
            welcome_message: None,
        }
    }

    #[test]
    fn test_forbidden_set_parsing() {
        let set = settings(Some("Spam, eggs ,,SPAM,  ")).forbidden_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("spam"));
        assert!(set.contains("eggs"));
    }

    #[test]
    fn test_forbidden_set_empty() {
        assert!(settings(None).forbidden_set().is_empty());
        assert!(settings(Some("")).forbidden_set().is_empty());
    }
}
