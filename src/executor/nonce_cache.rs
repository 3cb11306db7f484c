//! Mutex-guarded per-signer nonce cache, TTL ~2s.
//!
//! Reset to "must re-fetch" on any broadcast or simulation error (§4.5.2).
//! Incremented optimistically on issue so concurrent opportunities from a
//! single scan can each grab a distinct nonce without round-tripping to the
//! node.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use std::time::Instant;

use parking_lot::Mutex;

use crate::types::NonceCache;

const DEFAULT_TTL_MS: u64 = 2000;

pub struct NonceCacheHandle {
    inner: Mutex<Option<NonceCache>>,
    ttl_ms: u64,
}

impl Default for NonceCacheHandle {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl NonceCacheHandle {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            inner: Mutex::new(None),
            ttl_ms,
        }
    }

    /// Returns a fresh cached nonce and optimistically increments the
    /// in-memory value, or `None` if the cache is stale/invalid/empty (the
    /// caller must fetch `eth_getTransactionCount` and call `prime`).
    pub fn take_next(&self) -> Option<u64> {
        let mut guard = self.inner.lock();
        match *guard {
            Some(cache) if !cache.is_stale(self.ttl_ms) => {
                let nonce = cache.next_nonce;
                *guard = Some(NonceCache {
                    next_nonce: nonce + 1,
                    fetched_at: cache.fetched_at,
                    valid: true,
                });
                Some(nonce)
            }
            _ => None,
        }
    }

    /// Prime the cache with a freshly-fetched nonce.
    pub fn prime(&self, nonce: u64) {
        let mut guard = self.inner.lock();
        *guard = Some(NonceCache {
            next_nonce: nonce,
            fetched_at: Instant::now(),
            valid: true,
        });
    }

    /// Invalidate on any broadcast/simulation error — forces a re-fetch on
    /// next use.
    pub fn invalidate(&self) {
        let mut guard = self.inner.lock();
        if let Some(cache) = guard.as_mut() {
            cache.valid = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_returns_none() {
        let cache = NonceCacheHandle::default();
        assert!(cache.take_next().is_none());
    }

    #[test]
    fn primed_cache_increments_on_take() {
        let cache = NonceCacheHandle::default();
        cache.prime(10);
        assert_eq!(cache.take_next(), Some(10));
        assert_eq!(cache.take_next(), Some(11));
        assert_eq!(cache.take_next(), Some(12));
    }

    #[test]
    fn invalidate_forces_refetch() {
        let cache = NonceCacheHandle::default();
        cache.prime(5);
        cache.invalidate();
        assert!(cache.take_next().is_none());
    }

    #[test]
    fn stale_cache_returns_none() {
        let cache = NonceCacheHandle::new(0);
        cache.prime(1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.take_next().is_none());
    }
}
