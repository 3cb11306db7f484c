//! Per-token cooldown — suppress failed tokens with a short cooldown after
//! every failure and an escalated long cooldown after consecutive failures.
//!
//! A successful trade on a token resets its counter instantly. This adapts
//! the escalating route-cooldown pattern used elsewhere in this codebase's
//! sibling multi-DEX bot to the wall-clock, per-token model called for here
//! (failures are tracked per non-borrowed token, not per DEX-pair route).
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use std::collections::HashMap;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use parking_lot::Mutex;
use tracing::{debug, info};

struct CooldownEntry {
    last_failure: Instant,
    consecutive_failures: u32,
}

pub struct TokenCooldown {
    entries: Mutex<HashMap<Address, CooldownEntry>>,
    short_cooldown: Duration,
    long_cooldown: Duration,
    max_consecutive_failures: u32,
}

impl TokenCooldown {
    pub fn new(short_cooldown_secs: u64, long_cooldown_secs: u64, max_consecutive_failures: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            short_cooldown: Duration::from_secs(short_cooldown_secs),
            long_cooldown: Duration::from_secs(long_cooldown_secs),
            max_consecutive_failures,
        }
    }

    /// True if this token is currently suppressed.
    pub fn is_cooled_down(&self, token: Address) -> bool {
        let entries = self.entries.lock();
        let Some(entry) = entries.get(&token) else {
            return false;
        };
        let cooldown = if entry.consecutive_failures >= self.max_consecutive_failures {
            self.long_cooldown
        } else {
            self.short_cooldown
        };
        entry.last_failure.elapsed() < cooldown
    }

    /// Record a failure for `token`. Every failure triggers at least the
    /// short cooldown; after `max_consecutive_failures` in a row the long
    /// cooldown takes over.
    pub fn record_failure(&self, token: Address) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(token).or_insert_with(|| CooldownEntry {
            last_failure: Instant::now(),
            consecutive_failures: 0,
        });
        entry.consecutive_failures += 1;
        entry.last_failure = Instant::now();

        if entry.consecutive_failures >= self.max_consecutive_failures {
            info!(?token, failures = entry.consecutive_failures, "token entering long cooldown");
        } else {
            debug!(?token, failures = entry.consecutive_failures, "token entering short cooldown");
        }
    }

    /// A successful trade resets the token's failure counter instantly.
    pub fn record_success(&self, token: Address) {
        let mut entries = self.entries.lock();
        if entries.remove(&token).is_some() {
            info!(?token, "token cooldown reset after successful trade");
        }
    }

    pub fn active_count(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from(bytes)
    }

    #[test]
    fn not_cooled_down_initially() {
        let cd = TokenCooldown::new(60, 3600, 3);
        assert!(!cd.is_cooled_down(addr(1)));
    }

    #[test]
    fn single_failure_triggers_short_cooldown() {
        let cd = TokenCooldown::new(60, 3600, 3);
        cd.record_failure(addr(1));
        assert!(cd.is_cooled_down(addr(1)));
    }

    #[test]
    fn consecutive_failures_escalate_to_long_cooldown() {
        let cd = TokenCooldown::new(60, 3600, 3);
        cd.record_failure(addr(1));
        cd.record_failure(addr(1));
        cd.record_failure(addr(1));
        assert!(cd.is_cooled_down(addr(1)));
        assert_eq!(cd.active_count(), 1);
    }

    #[test]
    fn success_resets_counter() {
        let cd = TokenCooldown::new(60, 3600, 3);
        cd.record_failure(addr(1));
        cd.record_failure(addr(1));
        cd.record_success(addr(1));
        assert!(!cd.is_cooled_down(addr(1)));
        assert_eq!(cd.active_count(), 0);
    }

    #[test]
    fn tokens_are_tracked_independently() {
        let cd = TokenCooldown::new(60, 3600, 3);
        cd.record_failure(addr(1));
        assert!(cd.is_cooled_down(addr(1)));
        assert!(!cd.is_cooled_down(addr(2)));
    }
}
