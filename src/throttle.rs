//! Generic keyed rate limiter shared by the message and button-press
//! anti-flood policies.
//!
//! Each key tracks the instant of its most recent call plus how many
//! consecutive calls violated the configured rate. State lives only in this
//! process; idle keys are evicted by a periodic sweep and the first call
//! after eviction behaves like a first-ever call.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Result of a single rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleVerdict {
    /// The call respected the minimum inter-call interval.
    Ok,
    /// The call came too soon after the previous one.
    Throttled {
        /// How many consecutive calls have violated the rate.
        exceeded_streak: u32,
    },
}

struct Slot {
    last_call: Instant,
    exceeded_streak: u32,
}

/// Keyed rate limiter with per-key atomic read-modify-write.
///
/// Keys are created lazily on first use. Concurrent checks against the same
/// key serialize on the dashmap shard entry lock, so streak updates are
/// never lost; unrelated keys do not contend.
#[derive(Default)]
pub struct ThrottleRegistry {
    slots: DashMap<String, Slot>,
}

impl ThrottleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call against `key` and report whether it violated
    /// `rate_per_sec` (minimum inter-call interval of `1 / rate` seconds).
    ///
    /// A violating call increments the key's exceeded streak; a clean call
    /// resets it to zero. The first call for a key is always `Ok`.
    /// Non-positive rates disable limiting for the call.
    pub fn check(&self, key: &str, rate_per_sec: f64) -> ThrottleVerdict {
        if rate_per_sec <= 0.0 {
            return ThrottleVerdict::Ok;
        }
        let min_gap = Duration::from_secs_f64(1.0 / rate_per_sec);
        let now = Instant::now();

        match self.slots.entry(key.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    last_call: now,
                    exceeded_streak: 0,
                });
                ThrottleVerdict::Ok
            }
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                let violated = now.duration_since(slot.last_call) < min_gap;
                slot.last_call = now;
                if violated {
                    slot.exceeded_streak += 1;
                    ThrottleVerdict::Throttled {
                        exceeded_streak: slot.exceeded_streak,
                    }
                } else {
                    slot.exceeded_streak = 0;
                    ThrottleVerdict::Ok
                }
            }
        }
    }

    /// Drop every key whose last call is older than `max_idle`.
    ///
    /// Returns the number of evicted keys. Callers observe no behavior
    /// change beyond the next call on an evicted key being first-ever.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.slots.len();
        let now = Instant::now();
        self.slots
            .retain(|_, slot| now.duration_since(slot.last_call) < max_idle);
        before - self.slots.len()
    }

    /// Number of live keys, for logging.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A rate of 10/s gives a 100ms window: immediate repeat calls violate,
    // and a short sleep clears the window.
    const RATE: f64 = 10.0;

    #[test]
    fn test_first_call_is_ok() {
        let registry = ThrottleRegistry::new();
        assert_eq!(registry.check("k", RATE), ThrottleVerdict::Ok);
    }

    #[test]
    fn test_burst_increments_streak() {
        let registry = ThrottleRegistry::new();
        registry.check("k", RATE);
        for expected in 1..=4 {
            assert_eq!(
                registry.check("k", RATE),
                ThrottleVerdict::Throttled {
                    exceeded_streak: expected
                }
            );
        }
    }

    #[test]
    fn test_spaced_call_resets_streak() {
        let registry = ThrottleRegistry::new();
        registry.check("k", RATE);
        registry.check("k", RATE);
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(registry.check("k", RATE), ThrottleVerdict::Ok);
        // Streak starts over after the reset
        assert_eq!(
            registry.check("k", RATE),
            ThrottleVerdict::Throttled { exceeded_streak: 1 }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = ThrottleRegistry::new();
        registry.check("a", RATE);
        assert_eq!(registry.check("b", RATE), ThrottleVerdict::Ok);
        assert!(matches!(
            registry.check("a", RATE),
            ThrottleVerdict::Throttled { .. }
        ));
    }

    #[test]
    fn test_eviction_resets_key() {
        let registry = ThrottleRegistry::new();
        registry.check("k", RATE);
        registry.check("k", RATE);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(registry.evict_idle(Duration::from_millis(1)), 1);
        assert_eq!(registry.key_count(), 0);
        // First call after eviction behaves as first-ever
        assert_eq!(registry.check("k", RATE), ThrottleVerdict::Ok);
    }

    #[test]
    fn test_zero_rate_disables_limiting() {
        let registry = ThrottleRegistry::new();
        assert_eq!(registry.check("k", 0.0), ThrottleVerdict::Ok);
        assert_eq!(registry.check("k", 0.0), ThrottleVerdict::Ok);
    }
}
