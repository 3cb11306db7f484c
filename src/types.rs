//! Core data model: tokens, pools, and the three-stage opportunity pipeline.
//!
//! `RawOpportunity` (ProfitEngine output) → `VerifiedOpportunity` (SafetyLayer
//! output) → `SignedAttempt` (Executor output). Each stage is a distinct type
//! connected by total functions, so "quoter-verified" is a type-level property
//! rather than a boolean flag threaded through one mutable struct.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use std::time::Instant;

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Canonical V3 fee tiers, in units of 1/1,000,000.
pub const FEE_TIER_LOWEST: u32 = 100;
pub const FEE_TIER_LOW: u32 = 500;
pub const FEE_TIER_MEDIUM: u32 = 3000;
pub const FEE_TIER_HIGH: u32 = 10000;

/// Q64.96 fixed-point scale underlying `sqrtPriceX96`.
pub const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

/// A traded token: address, decimal exponent, and per-token guardrails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    /// Decimal exponent, 0-36 (e.g. 18 for WETH, 6 for USDC).
    pub decimals: u8,
    /// Per-token minimum-profit floor in the token's smallest unit. `None`
    /// means only the global floor applies.
    pub min_profit_floor: Option<U256>,
    /// Fee tiers this token is known to trade on.
    pub fee_tiers: Vec<u32>,
}

/// A concentrated-liquidity pool. Immutable fields are set once at
/// registration; mutable fields are written only by the StateUpdater.
#[derive(Debug, Clone)]
pub struct Pool {
    pub address: Address,
    /// Canonical ordering: lexicographically smaller address first.
    pub token0: Address,
    pub token1: Address,
    pub dec0: u8,
    pub dec1: u8,
    /// Fee tier in units of 1/1,000,000.
    pub fee: u32,

    /// `sqrtPriceX96` as reported by `slot0`. Zero means absent/uninitialised.
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub last_update: Option<Instant>,
}

impl Pool {
    pub fn new(address: Address, token0: Address, token1: Address, dec0: u8, dec1: u8, fee: u32) -> Self {
        Self {
            address,
            token0,
            token1,
            dec0,
            dec1,
            fee,
            sqrt_price_x96: U256::ZERO,
            tick: 0,
            liquidity: 0,
            last_update: None,
        }
    }

    /// A pool with `sqrtPriceX96 == 0` is uninitialised/absent and must be
    /// skipped by every downstream consumer (data model invariant).
    pub fn is_initialized(&self) -> bool {
        self.sqrt_price_x96 != U256::ZERO
    }

    /// Canonical (token0, token1) pair key, used to group pools trading the
    /// same underlying pair across fee tiers.
    pub fn pair_key(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }

    /// `sqrtPriceX96` normalised to a plain float, `sqrtPriceX96 / 2^96`.
    pub fn sqrt_price_normalized(&self) -> f64 {
        let raw: f64 = self.sqrt_price_x96.to_string().parse().unwrap_or(0.0);
        raw / Q96
    }

    /// Human-scale price of token0 in terms of token1:
    /// `price = sqrtPriceX96^2 * 10^(dec0-dec1) / 2^192`.
    pub fn price_0_to_1(&self) -> f64 {
        let sp = self.sqrt_price_normalized();
        let raw_price = sp * sp;
        raw_price * 10f64.powi(self.dec0 as i32 - self.dec1 as i32)
    }

    pub fn fee_percent(&self) -> f64 {
        self.fee as f64 / 1_000_000.0 * 100.0
    }
}

/// Direction of a single-tick swap within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    /// Swapping token0 in, token1 out.
    ZeroForOne,
    /// Swapping token1 in, token0 out.
    OneForZero,
}

impl SwapDirection {
    pub fn zero_for_one(self) -> bool {
        matches!(self, SwapDirection::ZeroForOne)
    }

    pub fn flip(self) -> Self {
        match self {
            SwapDirection::ZeroForOne => SwapDirection::OneForZero,
            SwapDirection::OneForZero => SwapDirection::ZeroForOne,
        }
    }
}

/// ProfitEngine output: a sized, locally-estimated candidate opportunity.
/// Never handed directly to the Executor — must pass through the
/// SafetyLayer to become a `VerifiedOpportunity` first.
#[derive(Debug, Clone)]
pub struct RawOpportunity {
    /// Low-price-side pool.
    pub pool_low: Address,
    /// High-price-side pool.
    pub pool_high: Address,
    /// The token being borrowed — always one of the pair's two tokens.
    pub borrow_token: Address,
    pub target_token: Address,
    pub fee_low: u32,
    pub fee_high: u32,
    /// Pool swap-1 (the flash-loan/entry leg) executes against. Either
    /// `pool_low` or `pool_high` depending on `direction`.
    pub entry_pool: Address,
    /// Fee tier swap-1 executes at — `fee_low` or `fee_high` to match
    /// `entry_pool`.
    pub entry_fee: u32,
    /// Pool swap-2 (the return leg) executes against.
    pub exit_pool: Address,
    /// Fee tier swap-2 executes at.
    pub exit_fee: u32,
    /// Chosen borrow amount, in the borrowed token's smallest unit.
    pub amount_in: U256,
    /// Local single-tick estimate of swap-1 output.
    pub estimated_swap1_out: U256,
    /// Local single-tick estimate of swap-2 output.
    pub estimated_swap2_out: U256,
    pub estimated_flash_fee: U256,
    /// Net profit estimate, before gas, from the single-tick approximation.
    pub estimated_net_profit: f64,
    pub direction: SwapDirection,
    /// Human-readable direction string for logging, e.g. "WETH/USDC low->high".
    pub direction_label: String,
}

/// SafetyLayer output: adds quoter-verified amounts, slippage floors, and
/// the gas-adjusted net profit. Only a `VerifiedOpportunity` may be handed
/// to the Executor.
#[derive(Debug, Clone)]
pub struct VerifiedOpportunity {
    pub raw: RawOpportunity,
    /// True on-chain quoted output for swap-1.
    pub quoted_swap1_out: U256,
    /// True on-chain quoted output for swap-2.
    pub quoted_swap2_out: U256,
    pub min_out_swap1: U256,
    pub min_out_swap2: U256,
    pub ticks_crossed_1: u32,
    pub ticks_crossed_2: u32,
    /// Total transaction cost estimate (L2 execution + L1 data fee), in wei.
    pub total_tx_cost_wei: U256,
    /// Net profit after fees and full L2+L1 cost accounting.
    pub net_profit_after_gas: i128,
}

impl VerifiedOpportunity {
    pub fn clears_floor(&self, floor: U256) -> bool {
        self.net_profit_after_gas > 0 && U256::from(self.net_profit_after_gas as u128) > floor
    }
}

/// Executor output: a fully-built, signed transaction attempt plus the
/// bookkeeping needed by the stuck-transaction monitor.
#[derive(Debug, Clone)]
pub struct SignedAttempt {
    pub opportunity: VerifiedOpportunity,
    pub nonce: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub calldata: Bytes,
    pub access_list_targets: Vec<Address>,
    /// Every broadcast hash for this logical attempt, in broadcast order.
    /// Replacements at the same nonce append here rather than overwriting.
    pub hashes: Vec<String>,
    pub speedup_count: u32,
}

impl SignedAttempt {
    pub fn latest_hash(&self) -> Option<&str> {
        self.hashes.last().map(|s| s.as_str())
    }
}

/// Final disposition of an execution attempt, logged to the execution
/// journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    Confirmed,
    SoftFail,
    Reverted,
    RejectedPreflight,
    Timeout,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptStatus::Confirmed => "confirmed",
            AttemptStatus::SoftFail => "soft_fail",
            AttemptStatus::Reverted => "reverted",
            AttemptStatus::RejectedPreflight => "rejected_preflight",
            AttemptStatus::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// Per-process, single-writer/multi-reader gas price cache. TTL ~1s.
#[derive(Debug, Clone, Copy)]
pub struct GasCache {
    pub base_fee_per_gas: u128,
    pub priority_fee_per_gas: u128,
    pub fetched_at: Instant,
}

impl GasCache {
    pub fn is_stale(&self, ttl_ms: u64) -> bool {
        self.fetched_at.elapsed().as_millis() as u64 > ttl_ms
    }
}

/// Per-signer nonce cache. TTL ~2s, or explicitly reset on broadcast failure.
#[derive(Debug, Clone, Copy)]
pub struct NonceCache {
    pub next_nonce: u64,
    pub fetched_at: Instant,
    pub valid: bool,
}

impl NonceCache {
    pub fn is_stale(&self, ttl_ms: u64) -> bool {
        !self.valid || self.fetched_at.elapsed().as_millis() as u64 > ttl_ms
    }
}

/// L1 data-fee parameters cached from the OP-Stack GasPriceOracle predeploy.
#[derive(Debug, Clone, Copy)]
pub struct L1FeeParams {
    pub l1_base_fee: u128,
    pub overhead: u128,
    pub scalar: u128,
    pub fetched_at: Instant,
}

impl L1FeeParams {
    pub fn is_stale(&self, ttl_ms: u64) -> bool {
        self.fetched_at.elapsed().as_millis() as u64 > ttl_ms
    }

    /// `L1BaseFee * (data_gas + overhead) * scalar / 10^6`, where
    /// `data_gas ≈ 10 * len(calldata)` for a typical zero/non-zero mix.
    pub fn l1_data_fee(&self, calldata_len: usize) -> u128 {
        let data_gas = 10u128 * calldata_len as u128;
        self.l1_base_fee
            .saturating_mul(data_gas.saturating_add(self.overhead))
            .saturating_mul(self.scalar)
            / 1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from(bytes)
    }

    #[test]
    fn uninitialized_pool_is_skipped() {
        let pool = Pool::new(addr(1), addr(2), addr(3), 18, 18, 3000);
        assert!(!pool.is_initialized());
    }

    #[test]
    fn initialized_pool_with_nonzero_sqrt_price() {
        let mut pool = Pool::new(addr(1), addr(2), addr(3), 18, 18, 3000);
        pool.sqrt_price_x96 = U256::from_str("79228162514264337593543950336").unwrap();
        assert!(pool.is_initialized());
    }

    #[test]
    fn price_at_parity_sqrt_price_is_one() {
        let mut pool = Pool::new(addr(1), addr(2), addr(3), 18, 18, 500);
        pool.sqrt_price_x96 = U256::from_str("79228162514264337593543950336").unwrap();
        let price = pool.price_0_to_1();
        assert!((price - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fee_percent_matches_tier() {
        let pool = Pool::new(addr(1), addr(2), addr(3), 18, 18, 3000);
        assert!((pool.fee_percent() - 0.30).abs() < 1e-9);
    }

    #[test]
    fn l1_data_fee_scales_with_calldata_len() {
        let params = L1FeeParams {
            l1_base_fee: 30_000_000_000,
            overhead: 188,
            scalar: 684_000,
            fetched_at: Instant::now(),
        };
        let small = params.l1_data_fee(100);
        let large = params.l1_data_fee(1000);
        assert!(large > small);
    }

    #[test]
    fn swap_direction_flips() {
        assert_eq!(SwapDirection::ZeroForOne.flip(), SwapDirection::OneForZero);
        assert_eq!(SwapDirection::OneForZero.flip(), SwapDirection::ZeroForOne);
    }
}
