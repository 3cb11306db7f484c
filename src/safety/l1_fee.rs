//! Mutex-guarded L1 data-fee parameter cache, TTL ~2s.
//!
//! Caches {L1 base fee, overhead, scalar} read from the OP-Stack
//! GasPriceOracle predeploy so the SafetyLayer's cost model doesn't issue a
//! fresh RPC call for every opportunity in a scan.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use std::time::Instant;

use parking_lot::Mutex;

use crate::types::L1FeeParams;

const DEFAULT_TTL_MS: u64 = 2000;

pub struct L1FeeCache {
    inner: Mutex<Option<L1FeeParams>>,
    ttl_ms: u64,
}

impl Default for L1FeeCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl L1FeeCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            inner: Mutex::new(None),
            ttl_ms,
        }
    }

    pub fn get_fresh(&self) -> Option<L1FeeParams> {
        let guard = self.inner.lock();
        match *guard {
            Some(params) if !params.is_stale(self.ttl_ms) => Some(params),
            _ => None,
        }
    }

    pub fn set(&self, l1_base_fee: u128, overhead: u128, scalar: u128) {
        let mut guard = self.inner.lock();
        *guard = Some(L1FeeParams {
            l1_base_fee,
            overhead,
            scalar,
            fetched_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_is_not_fresh() {
        let cache = L1FeeCache::default();
        assert!(cache.get_fresh().is_none());
    }

    #[test]
    fn cached_value_computes_l1_fee() {
        let cache = L1FeeCache::default();
        cache.set(30_000_000_000, 188, 684_000);
        let params = cache.get_fresh().expect("fresh");
        assert!(params.l1_data_fee(500) > 0);
    }
}
