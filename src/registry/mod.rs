//! PoolRegistry — deterministic pool address derivation and existence
//! verification.
//!
//! Enumerates all candidate pools at startup from the configured token set
//! and fee tiers, derives each pool's address via CREATE2 (no RPC calls),
//! then verifies existence with a single batched `slot0` read and exposes
//! the ordered survivors plus a pre-built batch-call plan for the
//! StateUpdater.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use tracing::{debug, info};

use crate::contracts::IUniswapV3Pool;
use crate::types::{Pool, Token};

/// 4-byte selector for `slot0()`.
const SLOT0_SELECTOR: [u8; 4] = [0x38, 0x50, 0xc7, 0xbd];
/// 4-byte selector for `liquidity()`.
const LIQUIDITY_SELECTOR: [u8; 4] = [0x1a, 0x68, 0x65, 0x02];

/// A single (target, calldata) pair the StateUpdater replays unchanged
/// every scan cycle.
#[derive(Debug, Clone)]
pub struct PlannedCall {
    pub target: Address,
    pub calldata: Bytes,
}

/// Compute a pool's CREATE2 address. Pure function of its inputs; matches
/// the value the chain's canonical factory contract would compute.
///
/// 1. Sort the two addresses ascending -> (token0, token1).
/// 2. `salt = keccak256(abi_encode(token0, token1, fee_uint24))`.
/// 3. `address = last_20_bytes(keccak256(0xff || factory || salt || init_code_hash))`.
pub fn derive_pool_address(token_a: Address, token_b: Address, fee: u32, factory: Address, init_code_hash: B256) -> (Address, Address, Address) {
    let (token0, token1) = if token_a < token_b { (token_a, token_b) } else { (token_b, token_a) };

    let encoded = (token0, token1, fee).abi_encode_params();
    let salt = keccak256(&encoded);

    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(factory.as_slice());
    preimage.extend_from_slice(salt.as_slice());
    preimage.extend_from_slice(init_code_hash.as_slice());

    let hash = keccak256(&preimage);
    let address = Address::from_slice(&hash[12..]);

    (address, token0, token1)
}

pub struct PoolRegistry {
    factory: Address,
    init_code_hash: B256,
    pools: Vec<Pool>,
}

impl PoolRegistry {
    /// Derive candidate addresses for every (tokenA, tokenB, fee) triple
    /// implied by `tokens` and `fee_tiers`, without any network I/O. Callers
    /// should follow with `verify_existence` once a provider is available.
    pub fn derive_candidates(tokens: &[Token], fee_tiers: &[u32], factory: Address, init_code_hash: B256) -> Self {
        let mut pools = Vec::new();

        for i in 0..tokens.len() {
            for j in (i + 1)..tokens.len() {
                for &fee in fee_tiers {
                    let (address, token0, token1) = derive_pool_address(tokens[i].address, tokens[j].address, fee, factory, init_code_hash);
                    let (dec0, dec1) = if token0 == tokens[i].address {
                        (tokens[i].decimals, tokens[j].decimals)
                    } else {
                        (tokens[j].decimals, tokens[i].decimals)
                    };
                    pools.push(Pool::new(address, token0, token1, dec0, dec1, fee));
                }
            }
        }

        debug!(candidate_count = pools.len(), "derived candidate pool addresses");
        Self { factory, init_code_hash, pools }
    }

    /// Drop candidates whose `slot0` call reverted or returned too little
    /// data. `responses[i]` must correspond to `pools[i]`'s `slot0` call, in
    /// the same order `batch_call_plan` emitted them.
    pub fn retain_existing(&mut self, slot0_responses: &[Option<Bytes>]) {
        assert_eq!(slot0_responses.len(), self.pools.len());

        let mut survivors = Vec::new();
        for (pool, response) in self.pools.drain(..).zip(slot0_responses) {
            match response {
                Some(data) if data.len() >= 64 => survivors.push(pool),
                _ => debug!(address = %pool.address, "pool candidate dropped: revert or short return"),
            }
        }
        info!(survivor_count = survivors.len(), "pool existence verification complete");
        self.pools = survivors;
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn pools_mut(&mut self) -> &mut [Pool] {
        &mut self.pools
    }

    pub fn find(&self, address: Address) -> Option<&Pool> {
        self.pools.iter().find(|p| p.address == address)
    }

    /// Pre-built batch-call plan for the StateUpdater: for each pool, a
    /// `slot0` call followed by a `liquidity` call, in that exact order.
    pub fn batch_call_plan(&self) -> Vec<PlannedCall> {
        let mut calls = Vec::with_capacity(self.pools.len() * 2);
        for pool in &self.pools {
            calls.push(PlannedCall {
                target: pool.address,
                calldata: Bytes::from(SLOT0_SELECTOR.to_vec()),
            });
            calls.push(PlannedCall {
                target: pool.address,
                calldata: Bytes::from(LIQUIDITY_SELECTOR.to_vec()),
            });
        }
        calls
    }

    /// Existence-check-only call plan (one `slot0` call per candidate, used
    /// before `retain_existing`).
    pub fn existence_check_plan(&self) -> Vec<PlannedCall> {
        self.pools
            .iter()
            .map(|pool| PlannedCall {
                target: pool.address,
                calldata: Bytes::from(SLOT0_SELECTOR.to_vec()),
            })
            .collect()
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn init_code_hash(&self) -> B256 {
        self.init_code_hash
    }
}

/// Decode a `slot0()` return blob into `(sqrtPriceX96, tick)`, ignoring the
/// remaining fields, per the StateUpdater's decoding rule.
pub fn decode_slot0(data: &Bytes) -> Option<(U256, i32)> {
    let decoded = IUniswapV3Pool::slot0Call::abi_decode_returns(data).ok()?;
    Some((decoded.sqrtPriceX96.to::<U256>(), decoded.tick.as_i32()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from(bytes)
    }

    fn hash(n: u8) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        B256::from(bytes)
    }

    #[test]
    fn derivation_is_a_pure_function_of_inputs() {
        let (addr1, t0_1, t1_1) = derive_pool_address(addr(1), addr(2), 3000, addr(9), hash(1));
        let (addr2, t0_2, t1_2) = derive_pool_address(addr(1), addr(2), 3000, addr(9), hash(1));
        assert_eq!(addr1, addr2);
        assert_eq!(t0_1, t0_2);
        assert_eq!(t1_1, t1_2);
    }

    #[test]
    fn derivation_sorts_tokens_ascending() {
        let (_addr, t0, t1) = derive_pool_address(addr(5), addr(2), 500, addr(9), hash(1));
        assert!(t0 < t1);
    }

    #[test]
    fn different_fee_tiers_produce_different_addresses() {
        let (addr_a, _, _) = derive_pool_address(addr(1), addr(2), 500, addr(9), hash(1));
        let (addr_b, _, _) = derive_pool_address(addr(1), addr(2), 3000, addr(9), hash(1));
        assert_ne!(addr_a, addr_b);
    }

    #[test]
    fn candidate_derivation_covers_all_pairs_and_fee_tiers() {
        let tokens = vec![
            Token { symbol: "A".into(), address: addr(1), decimals: 18, min_profit_floor: None, fee_tiers: vec![] },
            Token { symbol: "B".into(), address: addr(2), decimals: 6, min_profit_floor: None, fee_tiers: vec![] },
            Token { symbol: "C".into(), address: addr(3), decimals: 18, min_profit_floor: None, fee_tiers: vec![] },
        ];
        let registry = PoolRegistry::derive_candidates(&tokens, &[500, 3000], addr(9), hash(1));
        // 3 pairs * 2 fee tiers = 6 candidates.
        assert_eq!(registry.pools().len(), 6);
    }

    #[test]
    fn retain_existing_drops_reverted_and_short_responses() {
        let tokens = vec![
            Token { symbol: "A".into(), address: addr(1), decimals: 18, min_profit_floor: None, fee_tiers: vec![] },
            Token { symbol: "B".into(), address: addr(2), decimals: 6, min_profit_floor: None, fee_tiers: vec![] },
        ];
        let mut registry = PoolRegistry::derive_candidates(&tokens, &[500, 3000], addr(9), hash(1));
        assert_eq!(registry.pools().len(), 2);

        let responses = vec![Some(Bytes::from(vec![0u8; 64])), None];
        registry.retain_existing(&responses);
        assert_eq!(registry.pools().len(), 1);
    }

    #[test]
    fn batch_call_plan_emits_slot0_then_liquidity_per_pool() {
        let tokens = vec![
            Token { symbol: "A".into(), address: addr(1), decimals: 18, min_profit_floor: None, fee_tiers: vec![] },
            Token { symbol: "B".into(), address: addr(2), decimals: 6, min_profit_floor: None, fee_tiers: vec![] },
        ];
        let registry = PoolRegistry::derive_candidates(&tokens, &[500], addr(9), hash(1));
        let plan = registry.batch_call_plan();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].calldata.as_ref(), SLOT0_SELECTOR.as_slice());
        assert_eq!(plan[1].calldata.as_ref(), LIQUIDITY_SELECTOR.as_slice());
    }
}
