//! Moderation policies and the Telegram enforcement primitives they share.

/// Anti-flood gates for messages and button presses
pub mod flood;
/// Warn counter lifecycle and escalation
pub mod warn;
/// Forbidden-word screening
pub mod word_filter;

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, UserId};

use crate::config::MAX_RESTRICTION_MINUTES;
use crate::error::ModError;

/// Whether the user is the chat owner or an administrator.
pub async fn is_privileged(bot: &Bot, chat_id: ChatId, user_id: UserId) -> Result<bool, ModError> {
    let member = bot.get_chat_member(chat_id, user_id).await?;
    Ok(member.is_privileged())
}

fn until_date(minutes: i64) -> chrono::DateTime<Utc> {
    Utc::now() + chrono::Duration::minutes(minutes.clamp(0, MAX_RESTRICTION_MINUTES))
}

/// Revoke all send permissions for `minutes`.
pub async fn mute_until(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    minutes: i64,
) -> Result<(), ModError> {
    bot.restrict_chat_member(
        chat_id,
        UserId(user_id.cast_unsigned()),
        ChatPermissions::empty(),
    )
    .until_date(until_date(minutes))
    .await?;
    Ok(())
}

/// Restore full send permissions.
pub async fn lift_restrictions(bot: &Bot, chat_id: ChatId, user_id: i64) -> Result<(), ModError> {
    let permissions = ChatPermissions::SEND_MESSAGES
        | ChatPermissions::SEND_MEDIA_MESSAGES
        | ChatPermissions::SEND_OTHER_MESSAGES
        | ChatPermissions::ADD_WEB_PAGE_PREVIEWS;
    bot.restrict_chat_member(chat_id, UserId(user_id.cast_unsigned()), permissions)
        .await?;
    Ok(())
}

/// Remove the member from the chat until `minutes` from now.
pub async fn kick_for(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    minutes: i64,
) -> Result<(), ModError> {
    bot.ban_chat_member(chat_id, UserId(user_id.cast_unsigned()))
        .until_date(until_date(minutes))
        .await?;
    Ok(())
}

/// Remove the member from the chat permanently.
pub async fn ban_forever(bot: &Bot, chat_id: ChatId, user_id: i64) -> Result<(), ModError> {
    bot.ban_chat_member(chat_id, UserId(user_id.cast_unsigned()))
        .await?;
    Ok(())
}
