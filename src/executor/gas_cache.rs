//! Mutex-guarded gas-price cache, TTL ~1s.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use std::time::Instant;

use parking_lot::Mutex;

use crate::types::GasCache;

const DEFAULT_TTL_MS: u64 = 1000;

pub struct GasCacheHandle {
    inner: Mutex<Option<GasCache>>,
    ttl_ms: u64,
}

impl Default for GasCacheHandle {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl GasCacheHandle {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            inner: Mutex::new(None),
            ttl_ms,
        }
    }

    /// Returns the cached value if fresh, else `None` (caller should refetch
    /// and call `set`).
    pub fn get_fresh(&self) -> Option<GasCache> {
        let guard = self.inner.lock();
        match *guard {
            Some(cache) if !cache.is_stale(self.ttl_ms) => Some(cache),
            _ => None,
        }
    }

    pub fn set(&self, base_fee_per_gas: u128, priority_fee_per_gas: u128) {
        let mut guard = self.inner.lock();
        *guard = Some(GasCache {
            base_fee_per_gas,
            priority_fee_per_gas,
            fetched_at: Instant::now(),
        });
    }

    pub fn invalidate(&self) {
        let mut guard = self.inner.lock();
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_is_not_fresh() {
        let cache = GasCacheHandle::default();
        assert!(cache.get_fresh().is_none());
    }

    #[test]
    fn set_value_is_fresh_immediately() {
        let cache = GasCacheHandle::default();
        cache.set(1_000_000_000, 100_000_000);
        let fresh = cache.get_fresh().expect("should be fresh");
        assert_eq!(fresh.base_fee_per_gas, 1_000_000_000);
    }

    #[test]
    fn invalidate_clears_cache() {
        let cache = GasCacheHandle::default();
        cache.set(1_000_000_000, 100_000_000);
        cache.invalidate();
        assert!(cache.get_fresh().is_none());
    }

    #[test]
    fn stale_after_ttl_elapses() {
        let cache = GasCacheHandle::new(0);
        cache.set(1, 1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get_fresh().is_none());
    }
}
