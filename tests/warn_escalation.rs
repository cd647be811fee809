//! Warn lifecycle properties exercised against an in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use chat_warden::error::ModError;
use chat_warden::moderation::warn::{WarnEscalation, WarnOutcome, WarnStore};
use chat_warden::store::settings::WarnPolicy;

/// Store double backed by plain maps, mirroring the two tables the warn
/// flow touches.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<(i64, i64), i32>>,
    policies: Mutex<HashMap<i64, WarnPolicy>>,
}

impl MemoryStore {
    fn with_policy(chat_id: i64, max_warnings: i32, restriction_minutes: i64) -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            chat_id,
            WarnPolicy {
                max_warnings,
                restriction_minutes,
            },
        );
        Self {
            records: Mutex::new(HashMap::new()),
            policies: Mutex::new(policies),
        }
    }
}

#[async_trait]
impl WarnStore for MemoryStore {
    async fn warn_count(&self, chat_id: i64, user_id: i64) -> Result<Option<i32>, ModError> {
        Ok(self.records.lock().await.get(&(chat_id, user_id)).copied())
    }

    async fn insert_warning(&self, chat_id: i64, user_id: i64) -> Result<(), ModError> {
        self.records.lock().await.insert((chat_id, user_id), 1);
        Ok(())
    }

    async fn increment_warning(&self, chat_id: i64, user_id: i64) -> Result<(), ModError> {
        *self
            .records
            .lock()
            .await
            .entry((chat_id, user_id))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn clear_warnings(&self, chat_id: i64, user_id: i64) -> Result<(), ModError> {
        self.records.lock().await.remove(&(chat_id, user_id));
        Ok(())
    }

    async fn warn_policy(&self, chat_id: i64) -> Result<Option<WarnPolicy>, ModError> {
        Ok(self.policies.lock().await.get(&chat_id).copied())
    }
}

const CHAT: i64 = -1001;
const USER: i64 = 42;

fn engine(store: MemoryStore) -> (Arc<MemoryStore>, WarnEscalation) {
    let store = Arc::new(store);
    let engine = WarnEscalation::new(store.clone());
    (store, engine)
}

#[tokio::test]
async fn three_warnings_escalate_and_reset() {
    let store = MemoryStore::with_policy(CHAT, 3, 120);
    let (store, engine) = engine(store);

    assert_eq!(
        engine.apply(CHAT, USER).await.expect("first warn"),
        WarnOutcome::Warned { count: 1 }
    );
    assert_eq!(
        engine.apply(CHAT, USER).await.expect("second warn"),
        WarnOutcome::Warned { count: 2 }
    );
    assert_eq!(
        engine.apply(CHAT, USER).await.expect("third warn"),
        WarnOutcome::Escalated {
            count: 3,
            restriction_minutes: 120
        }
    );

    // Escalation deletes the record; the next warning starts over
    assert!(store.records.lock().await.is_empty());
    assert_eq!(
        engine.apply(CHAT, USER).await.expect("fresh warn"),
        WarnOutcome::Warned { count: 1 }
    );
}

#[tokio::test]
async fn threshold_of_one_escalates_immediately() {
    let store = MemoryStore::with_policy(CHAT, 1, 60);
    let (store, engine) = engine(store);

    assert_eq!(
        engine.apply(CHAT, USER).await.expect("first warn"),
        WarnOutcome::Escalated {
            count: 1,
            restriction_minutes: 60
        }
    );
    assert!(store.records.lock().await.is_empty());
}

#[tokio::test]
async fn policy_change_applies_to_next_warning() {
    let store = MemoryStore::with_policy(CHAT, 5, 60);
    let (store, engine) = engine(store);

    engine.apply(CHAT, USER).await.expect("first warn");
    engine.apply(CHAT, USER).await.expect("second warn");

    // Tighten the threshold mid-stream; the next apply must see it
    store.policies.lock().await.insert(
        CHAT,
        WarnPolicy {
            max_warnings: 3,
            restriction_minutes: 30,
        },
    );
    assert_eq!(
        engine.apply(CHAT, USER).await.expect("third warn"),
        WarnOutcome::Escalated {
            count: 3,
            restriction_minutes: 30
        }
    );
}

#[tokio::test]
async fn pardon_clears_the_record() {
    let store = MemoryStore::with_policy(CHAT, 3, 120);
    let (store, engine) = engine(store);

    engine.apply(CHAT, USER).await.expect("first warn");
    engine.apply(CHAT, USER).await.expect("second warn");
    engine.pardon(CHAT, USER).await.expect("pardon");

    assert!(store.records.lock().await.is_empty());
    assert_eq!(
        engine.apply(CHAT, USER).await.expect("fresh warn"),
        WarnOutcome::Warned { count: 1 }
    );
}

#[tokio::test]
async fn pairs_are_independent() {
    let store = MemoryStore::with_policy(CHAT, 3, 120);
    let (_, engine) = engine(store);

    engine.apply(CHAT, USER).await.expect("warn user");
    assert_eq!(
        engine.apply(CHAT, USER + 1).await.expect("warn other user"),
        WarnOutcome::Warned { count: 1 }
    );
}

#[tokio::test]
async fn pair_locks_are_released_after_use() {
    let store = MemoryStore::with_policy(CHAT, 3, 120);
    let (_, engine) = engine(store);

    engine.apply(CHAT, USER).await.expect("warn user");
    engine.apply(CHAT, USER + 1).await.expect("warn other user");
    engine.pardon(CHAT, USER).await.expect("pardon");

    // The lock table must not keep an entry per pair ever warned
    assert_eq!(engine.lock_count(), 0);
}

#[tokio::test]
async fn missing_settings_row_is_a_data_integrity_error() {
    let (_, engine) = engine(MemoryStore::default());

    let err = engine.apply(CHAT, USER).await.expect_err("must fail");
    assert!(matches!(err, ModError::DataIntegrity(chat) if chat == CHAT));
}

#[tokio::test]
async fn concurrent_warnings_never_lose_updates() {
    let store = MemoryStore::with_policy(CHAT, 100, 60);
    let store = Arc::new(store);
    let engine = Arc::new(WarnEscalation::new(store.clone()));

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move { engine.apply(CHAT, USER).await }));
    }
    for task in tasks {
        task.await.expect("join").expect("apply");
    }

    assert_eq!(store.records.lock().await.get(&(CHAT, USER)), Some(&20));
    assert_eq!(engine.lock_count(), 0);
}
