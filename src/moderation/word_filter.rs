//! Forbidden-word screening for plain text messages.
//!
//! Matching is token-exact and case-insensitive: the message text is split
//! into lowercase word tokens and intersected with the chat's forbidden
//! set, so "spam" matches "SPAM" but not "leafspam". Settings problems
//! (missing row, query failure) mean "no action" — screening never blocks
//! an otherwise healthy chat.

use std::collections::HashSet;

use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::bot::texts;
use crate::error::ModError;
use crate::moderation::is_privileged;
use crate::moderation::warn::{enforce, WarnEscalation};
use crate::store::{settings, Database};

/// Match lowercase word tokens
static RE_TOKEN: lazy_regex::Lazy<regex::Regex> = lazy_regex::lazy_regex!(r"\w+");

/// First forbidden word appearing as a whole token in `text`, if any.
#[must_use]
pub fn find_forbidden(text: &str, forbidden: &HashSet<String>) -> Option<String> {
    if forbidden.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();
    RE_TOKEN
        .find_iter(&lowered)
        .map(|token| token.as_str())
        .find(|token| forbidden.contains(*token))
        .map(str::to_string)
}

/// Screen one message against the chat's forbidden-word set.
///
/// On a match the message is deleted; admin senders only get a notice,
/// everyone else goes through warn escalation.
pub async fn screen_message(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    warn_engine: &WarnEscalation,
) -> Result<(), ModError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    let chat_settings = match settings::fetch_settings(db, msg.chat.id.0).await {
        Ok(Some(chat_settings)) => chat_settings,
        Ok(None) => return Ok(()),
        Err(err) => {
            debug!("word filter skipped, settings unreadable: {err}");
            return Ok(());
        }
    };
    if !chat_settings.auto_warn {
        return Ok(());
    }

    let Some(matched) = find_forbidden(text, &chat_settings.forbidden_set()) else {
        return Ok(());
    };
    debug!(chat = msg.chat.id.0, word = %matched, "forbidden word matched");

    if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
        warn!("failed to delete filtered message: {err}");
    }

    let user_id = from.id.0.cast_signed();
    if is_privileged(bot, msg.chat.id, from.id).await? {
        texts::send_html(bot, msg.chat.id, texts::WARN_ADMIN).await?;
    } else {
        let outcome = warn_engine.apply(msg.chat.id.0, user_id).await?;
        enforce(bot, msg.chat.id, user_id, &from.full_name(), outcome).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbidden(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn test_case_insensitive_token_match() {
        let set = forbidden(&["spam"]);
        assert_eq!(
            find_forbidden("Please stop the SPAM now", &set),
            Some("spam".to_string())
        );
    }

    #[test]
    fn test_substring_is_not_a_match() {
        let set = forbidden(&["spam"]);
        assert_eq!(find_forbidden("leafspam is a plant", &set), None);
    }

    #[test]
    fn test_punctuation_boundaries() {
        let set = forbidden(&["spam"]);
        assert!(find_forbidden("so: spam, right?", &set).is_some());
    }

    #[test]
    fn test_cyrillic_tokens() {
        let set = forbidden(&["спам"]);
        assert!(find_forbidden("Хватит слать СПАМ!", &set).is_some());
    }

    #[test]
    fn test_empty_set_never_matches() {
        assert_eq!(find_forbidden("anything at all", &HashSet::new()), None);
    }
}
