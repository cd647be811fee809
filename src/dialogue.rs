//! Per-(chat, user) configuration dialogue state.
//!
//! An admin selecting a configuration item from the settings keyboard enters
//! one of three capture stages; the next qualifying message from that admin
//! in that chat completes (or cancels) the capture. At most one stage is
//! active per (chat, user): entering a new one overwrites rather than
//! stacks. Abandoned dialogues expire lazily after a timeout.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// What the pending dialogue is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStage {
    /// A file attachment with the forbidden-word list
    AwaitingWordList,
    /// Message text to store verbatim as the welcome message
    AwaitingWelcome,
    /// A plain integer number of restriction minutes
    AwaitingDuration,
}

struct DialogueEntry {
    stage: ConfigStage,
    entered_at: Instant,
}

/// In-memory store of pending configuration dialogues.
pub struct DialogueRegistry {
    entries: DashMap<(i64, i64), DialogueEntry>,
    timeout: Duration,
}

impl DialogueRegistry {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            timeout,
        }
    }

    /// Start (or replace) the pending stage for a (chat, user) pair.
    pub fn enter(&self, chat_id: i64, user_id: i64, stage: ConfigStage) {
        self.entries.insert(
            (chat_id, user_id),
            DialogueEntry {
                stage,
                entered_at: Instant::now(),
            },
        );
    }

    /// Current stage for a (chat, user) pair, expiring stale entries.
    pub fn current(&self, chat_id: i64, user_id: i64) -> Option<ConfigStage> {
        let key = (chat_id, user_id);
        let entry = self.entries.get(&key)?;
        if entry.entered_at.elapsed() > self.timeout {
            drop(entry);
            self.entries.remove(&key);
            return None;
        }
        Some(entry.stage)
    }

    /// Drop the pending stage. Returns whether one was active.
    pub fn cancel(&self, chat_id: i64, user_id: i64) -> bool {
        self.entries.remove(&(chat_id, user_id)).is_some()
    }

    /// Clear everything; used at shutdown.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DialogueRegistry {
        DialogueRegistry::new(Duration::from_secs(60))
    }

    #[test]
    fn test_enter_and_current() {
        let reg = registry();
        assert_eq!(reg.current(1, 2), None);
        reg.enter(1, 2, ConfigStage::AwaitingWelcome);
        assert_eq!(reg.current(1, 2), Some(ConfigStage::AwaitingWelcome));
        // Scoped to the exact (chat, user) pair
        assert_eq!(reg.current(1, 3), None);
        assert_eq!(reg.current(2, 2), None);
    }

    #[test]
    fn test_enter_overwrites_instead_of_stacking() {
        let reg = registry();
        reg.enter(1, 2, ConfigStage::AwaitingWordList);
        reg.enter(1, 2, ConfigStage::AwaitingDuration);
        assert_eq!(reg.current(1, 2), Some(ConfigStage::AwaitingDuration));
    }

    #[test]
    fn test_cancel() {
        let reg = registry();
        reg.enter(1, 2, ConfigStage::AwaitingWelcome);
        assert!(reg.cancel(1, 2));
        assert!(!reg.cancel(1, 2));
        assert_eq!(reg.current(1, 2), None);
    }

    #[test]
    fn test_stale_entries_expire() {
        let reg = DialogueRegistry::new(Duration::from_millis(10));
        reg.enter(1, 2, ConfigStage::AwaitingWelcome);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(reg.current(1, 2), None);
    }
}
