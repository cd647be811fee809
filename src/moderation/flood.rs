//! Anti-flood gates run before every handler body.
//!
//! Both gates consume the event as soon as the registry reports a
//! violation; the difference is what happens to the offender. Messages cost
//! a 10-minute mute plus best-effort deletion of the triggering message,
//! button floods cost removal from the chat. Administrators are exempt from
//! the restriction but their event is still cancelled. Streaks above the
//! action limit mean the user is already restricted from the prior trigger,
//! so no new restriction is issued.

use teloxide::prelude::*;
use tracing::debug;

use crate::bot::texts;
use crate::config::{FLOOD_MAX_ACTIONED_STREAK, FLOOD_RESTRICTION_MINUTES};
use crate::error::ModError;
use crate::moderation::{is_privileged, kick_for, mute_until};
use crate::throttle::{ThrottleRegistry, ThrottleVerdict};

/// What the gate decided about the current event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodAction {
    /// Rate respected, run the handler.
    Proceed,
    /// Consume the event without touching the offender.
    Cancel,
    /// Consume the event and issue a fresh restriction.
    CancelAndRestrict,
}

/// Map a throttle verdict and the sender's role to a gate decision.
#[must_use]
pub fn classify(verdict: ThrottleVerdict, is_admin: bool) -> FloodAction {
    match verdict {
        ThrottleVerdict::Ok => FloodAction::Proceed,
        ThrottleVerdict::Throttled { .. } if is_admin => FloodAction::Cancel,
        ThrottleVerdict::Throttled { exceeded_streak }
            if exceeded_streak <= FLOOD_MAX_ACTIONED_STREAK =>
        {
            FloodAction::CancelAndRestrict
        }
        ThrottleVerdict::Throttled { .. } => FloodAction::Cancel,
    }
}

/// Rate counters are scoped per logical action per (chat, user).
fn scoped_key(key: &str, chat_id: ChatId, user_id: u64) -> String {
    format!("{key}:{chat_id}:{user_id}")
}

/// Message-path gate. Returns whether the handler body may run.
pub async fn gate_message(
    bot: &Bot,
    msg: &Message,
    registry: &ThrottleRegistry,
    key: &str,
    rate_per_sec: f64,
) -> Result<bool, ModError> {
    let Some(from) = msg.from.as_ref() else {
        // Service messages carry no sender to throttle
        return Ok(true);
    };
    let verdict = registry.check(&scoped_key(key, msg.chat.id, from.id.0), rate_per_sec);
    if verdict == ThrottleVerdict::Ok {
        return Ok(true);
    }

    let admin = is_privileged(bot, msg.chat.id, from.id).await?;
    if classify(verdict, admin) == FloodAction::CancelAndRestrict {
        // The triggering message may already be gone
        if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
            debug!("flood message already deleted: {err}");
        }
        let user_id = from.id.0.cast_signed();
        mute_until(bot, msg.chat.id, user_id, FLOOD_RESTRICTION_MINUTES).await?;
        let mention = texts::mention(user_id, &from.full_name());
        texts::send_html(bot, msg.chat.id, &texts::flood_muted(&mention)).await?;
    }
    Ok(false)
}

/// Button-path gate. Returns whether the callback handler may run.
pub async fn gate_callback(
    bot: &Bot,
    query: &CallbackQuery,
    registry: &ThrottleRegistry,
    key: &str,
    rate_per_sec: f64,
) -> Result<bool, ModError> {
    let Some(msg) = query.regular_message() else {
        return Ok(true);
    };
    let verdict = registry.check(&scoped_key(key, msg.chat.id, query.from.id.0), rate_per_sec);
    if verdict == ThrottleVerdict::Ok {
        return Ok(true);
    }

    let admin = is_privileged(bot, msg.chat.id, query.from.id).await?;
    if classify(verdict, admin) == FloodAction::CancelAndRestrict {
        let user_id = query.from.id.0.cast_signed();
        kick_for(bot, msg.chat.id, user_id, FLOOD_RESTRICTION_MINUTES).await?;
        let mention = texts::mention(user_id, &query.from.full_name());
        texts::send_html(bot, msg.chat.id, &texts::callback_kicked(&mention)).await?;
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_call_proceeds() {
        assert_eq!(classify(ThrottleVerdict::Ok, false), FloodAction::Proceed);
        assert_eq!(classify(ThrottleVerdict::Ok, true), FloodAction::Proceed);
    }

    #[test]
    fn test_admin_is_exempt_but_cancelled() {
        let verdict = ThrottleVerdict::Throttled { exceeded_streak: 1 };
        assert_eq!(classify(verdict, true), FloodAction::Cancel);
    }

    #[test]
    fn test_fresh_streak_restricts() {
        for streak in 1..=2 {
            let verdict = ThrottleVerdict::Throttled {
                exceeded_streak: streak,
            };
            assert_eq!(classify(verdict, false), FloodAction::CancelAndRestrict);
        }
    }

    #[test]
    fn test_long_streak_does_not_re_restrict() {
        let verdict = ThrottleVerdict::Throttled { exceeded_streak: 3 };
        assert_eq!(classify(verdict, false), FloodAction::Cancel);
    }
}
