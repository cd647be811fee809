//! Warn counter lifecycle for a (chat, user) pair.
//!
//! `WarnEscalation::apply` is the single mutation path: it creates or
//! increments the warn record, re-reads the chat's thresholds so settings
//! changes take effect immediately, and converts the record into an
//! escalation once the threshold is reached. The record delete and the
//! escalation decision are one logical unit — a record at or above the
//! threshold never survives the call.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use teloxide::prelude::*;
use tokio::sync::Mutex;

use crate::bot::texts;
use crate::error::ModError;
use crate::moderation::mute_until;
use crate::store::settings::{self, WarnPolicy};
use crate::store::{warnings, Database};

/// Outcome of a single warn application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnOutcome {
    /// A warning was recorded and the user stays in the chat.
    Warned {
        /// New warning count for the pair
        count: i32,
    },
    /// The threshold was reached: the record was cleared and the caller
    /// must restrict the user.
    Escalated {
        /// Count that tripped the threshold
        count: i32,
        /// How long the restriction lasts
        restriction_minutes: i64,
    },
}

/// Narrow persistence interface for the warn flow, so the escalation
/// algorithm can be exercised without a live database.
#[async_trait]
pub trait WarnStore: Send + Sync {
    async fn warn_count(&self, chat_id: i64, user_id: i64) -> Result<Option<i32>, ModError>;
    async fn insert_warning(&self, chat_id: i64, user_id: i64) -> Result<(), ModError>;
    async fn increment_warning(&self, chat_id: i64, user_id: i64) -> Result<(), ModError>;
    async fn clear_warnings(&self, chat_id: i64, user_id: i64) -> Result<(), ModError>;
    async fn warn_policy(&self, chat_id: i64) -> Result<Option<WarnPolicy>, ModError>;
}

#[async_trait]
impl WarnStore for Database {
    async fn warn_count(&self, chat_id: i64, user_id: i64) -> Result<Option<i32>, ModError> {
        Ok(warnings::warn_count(self, chat_id, user_id).await?)
    }

    async fn insert_warning(&self, chat_id: i64, user_id: i64) -> Result<(), ModError> {
        Ok(warnings::insert_warning(self, chat_id, user_id).await?)
    }

    async fn increment_warning(&self, chat_id: i64, user_id: i64) -> Result<(), ModError> {
        Ok(warnings::increment_warning(self, chat_id, user_id).await?)
    }

    async fn clear_warnings(&self, chat_id: i64, user_id: i64) -> Result<(), ModError> {
        warnings::clear_warnings(self, chat_id, user_id).await?;
        Ok(())
    }

    async fn warn_policy(&self, chat_id: i64) -> Result<Option<WarnPolicy>, ModError> {
        Ok(settings::warn_policy(self, chat_id).await?)
    }
}

/// Owns the warn-counter lifecycle.
///
/// A per-(chat, user) async mutex serializes the read-increment-compare-reset
/// sequence so concurrently delivered events cannot lose updates or
/// double-escalate. Unrelated pairs never contend.
pub struct WarnEscalation {
    store: Arc<dyn WarnStore>,
    locks: DashMap<(i64, i64), Arc<Mutex<()>>>,
}

impl WarnEscalation {
    #[must_use]
    pub fn new(store: Arc<dyn WarnStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    fn pair_lock(&self, chat_id: i64, user_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry((chat_id, user_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the pair's lock entry once no other task holds it, so the
    /// table does not grow with every pair ever warned. The count of two
    /// covers the map's reference plus the caller's clone; a waiting task
    /// holds a third and keeps the entry alive.
    fn release_pair_lock(&self, chat_id: i64, user_id: i64) {
        self.locks
            .remove_if(&(chat_id, user_id), |_, lock| Arc::strong_count(lock) <= 2);
    }

    /// Number of live pair locks, for logging.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Record one infraction for the pair and decide whether it escalates.
    ///
    /// The threshold check applies uniformly, including the very first
    /// warning, so a chat configured with `max_warnings = 1` escalates
    /// immediately.
    ///
    /// # Errors
    ///
    /// [`ModError::DataIntegrity`] when the chat has no settings row;
    /// store failures propagate.
    pub async fn apply(&self, chat_id: i64, user_id: i64) -> Result<WarnOutcome, ModError> {
        let lock = self.pair_lock(chat_id, user_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(chat_id, user_id).await
        };
        self.release_pair_lock(chat_id, user_id);
        result
    }

    async fn apply_locked(&self, chat_id: i64, user_id: i64) -> Result<WarnOutcome, ModError> {
        let count = match self.store.warn_count(chat_id, user_id).await? {
            None => {
                self.store.insert_warning(chat_id, user_id).await?;
                1
            }
            Some(prior) => {
                self.store.increment_warning(chat_id, user_id).await?;
                prior + 1
            }
        };

        // Re-read after the increment so a settings change made since the
        // previous warning takes effect now
        let policy = self
            .store
            .warn_policy(chat_id)
            .await?
            .ok_or(ModError::DataIntegrity(chat_id))?;

        if count >= policy.max_warnings {
            self.store.clear_warnings(chat_id, user_id).await?;
            Ok(WarnOutcome::Escalated {
                count,
                restriction_minutes: policy.restriction_minutes,
            })
        } else {
            Ok(WarnOutcome::Warned { count })
        }
    }

    /// Drop all warnings for the pair (the `!acquit` command).
    pub async fn pardon(&self, chat_id: i64, user_id: i64) -> Result<(), ModError> {
        let lock = self.pair_lock(chat_id, user_id);
        let result = {
            let _guard = lock.lock().await;
            self.store.clear_warnings(chat_id, user_id).await
        };
        self.release_pair_lock(chat_id, user_id);
        result
    }
}

/// Announce a warn outcome and, on escalation, mute the offender.
pub async fn enforce(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    display_name: &str,
    outcome: WarnOutcome,
) -> Result<(), ModError> {
    let mention = texts::mention(user_id, display_name);
    match outcome {
        WarnOutcome::Warned { count } => {
            texts::send_html(bot, chat_id, &texts::warn_notice(&mention, count)).await?;
        }
        WarnOutcome::Escalated {
            restriction_minutes,
            ..
        } => {
            mute_until(bot, chat_id, user_id, restriction_minutes).await?;
            texts::send_html(bot, chat_id, &texts::escalated(&mention, restriction_minutes))
                .await?;
        }
    }
    Ok(())
}
