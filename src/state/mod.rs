//! StateUpdater — one batched `aggregate3` RPC per scan cycle.
//!
//! Replays the PoolRegistry's pre-built batch-call plan (slot0 + liquidity
//! per pool, in order) through a single Multicall3 call, decodes the
//! responses, and writes each pool's fresh snapshot atomically. If the
//! aggregate call itself fails (not an individual leg — the whole RPC), the
//! entire cycle is skipped and the previous snapshot is left in place.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, Bytes};
use alloy::providers::Provider;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::contracts::IMulticall3;
use crate::error::CoreError;
use crate::registry::{decode_slot0, PoolRegistry};
use crate::rpc::RpcPool;
use crate::types::Pool;

/// 4-byte selector for `liquidity()`, duplicated here because decoding the
/// second half of each pool's pair of results needs no struct, just a u128.
fn decode_liquidity(data: &Bytes) -> Option<u128> {
    if data.len() < 32 {
        return None;
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&data[16..32]);
    Some(u128::from_be_bytes(buf))
}

/// Shared, lock-per-pool snapshot table. Readers (ProfitEngine) take a read
/// lock per pool; the StateUpdater is the sole writer.
pub type PoolTable = Arc<DashMap<Address, RwLock<Pool>>>;

pub struct StateUpdater<P: Provider + Clone> {
    rpc_pool: Arc<RpcPool<P>>,
    multicall_address: Address,
    pools: PoolTable,
}

impl<P: Provider + Clone> StateUpdater<P> {
    pub fn new(rpc_pool: Arc<RpcPool<P>>, multicall_address: Address, registry: &PoolRegistry) -> Self {
        let pools = Arc::new(DashMap::new());
        for pool in registry.pools() {
            pools.insert(pool.address, RwLock::new(pool.clone()));
        }
        Self { rpc_pool, multicall_address, pools }
    }

    pub fn pools(&self) -> PoolTable {
        Arc::clone(&self.pools)
    }

    /// Run one refresh cycle: batch every pool's slot0+liquidity call into a
    /// single `aggregate3`, decode, and write snapshots in place. Returns the
    /// number of pools successfully refreshed.
    pub async fn refresh(&self, registry: &PoolRegistry) -> Result<usize, CoreError> {
        let started = Instant::now();
        let plan = registry.batch_call_plan();
        if plan.is_empty() {
            return Ok(0);
        }

        let calls: Vec<IMulticall3::Call3> = plan
            .iter()
            .map(|call| IMulticall3::Call3 {
                target: call.target,
                allowFailure: true,
                callData: call.calldata.clone(),
            })
            .collect();

        let multicall_address = self.multicall_address;
        let results = self
            .rpc_pool
            .execute_with_retry("state_refresh_aggregate3", |provider| {
                let calls = calls.clone();
                async move {
                    let multicall = IMulticall3::new(multicall_address, provider);
                    multicall
                        .aggregate3(calls)
                        .call()
                        .await
                        .map(|r| r.returnData)
                        .map_err(|err| CoreError::Network(err.to_string()))
                }
            })
            .await
            .map_err(|err| {
                warn!(error = %err, "aggregate3 call failed on every rpc endpoint, skipping this cycle");
                CoreError::AggregateCallFailed(err.to_string())
            })?;

        if results.len() != plan.len() {
            return Err(CoreError::AggregateCallFailed(format!(
                "expected {} results, got {}",
                plan.len(),
                results.len()
            )));
        }

        let mut refreshed = 0usize;
        for pool in registry.pools() {
            let slot0_idx = self.index_of(registry, pool.address, 0);
            let liquidity_idx = self.index_of(registry, pool.address, 1);

            let (Some(slot0_idx), Some(liquidity_idx)) = (slot0_idx, liquidity_idx) else {
                continue;
            };

            let slot0_result = &results[slot0_idx];
            let liquidity_result = &results[liquidity_idx];

            if !slot0_result.success || !liquidity_result.success {
                debug!(address = %pool.address, "pool leg reverted this cycle, leaving prior snapshot");
                continue;
            }

            let Some((sqrt_price_x96, tick)) = decode_slot0(&slot0_result.returnData) else {
                continue;
            };
            let Some(liquidity) = decode_liquidity(&liquidity_result.returnData) else {
                continue;
            };

            if let Some(entry) = self.pools.get(&pool.address) {
                let mut guard = entry.write();
                guard.sqrt_price_x96 = sqrt_price_x96;
                guard.tick = tick;
                guard.liquidity = liquidity;
                guard.last_update = Some(Instant::now());
                refreshed += 1;
            }
        }

        info!(
            refreshed,
            total = registry.pools().len(),
            elapsed_ms = started.elapsed().as_millis(),
            "state refresh cycle complete"
        );
        Ok(refreshed)
    }

    /// Locate the batch-call-plan index for `(pool, leg)` where leg 0 is
    /// slot0 and leg 1 is liquidity, matching the interleaved order
    /// `PoolRegistry::batch_call_plan` emits.
    fn index_of(&self, registry: &PoolRegistry, address: Address, leg: usize) -> Option<usize> {
        registry.pools().iter().position(|p| p.address == address).map(|i| i * 2 + leg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_liquidity_reads_low_16_bytes_as_u128() {
        let mut data = vec![0u8; 32];
        data[31] = 42;
        let decoded = decode_liquidity(&Bytes::from(data)).unwrap();
        assert_eq!(decoded, 42);
    }

    #[test]
    fn decode_liquidity_rejects_short_data() {
        let data = Bytes::from(vec![0u8; 10]);
        assert!(decode_liquidity(&data).is_none());
    }
}
