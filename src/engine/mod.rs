//! ProfitEngine — local AMM math and optimal-size search, no network I/O.
//!
//! Given the current pool snapshot, enumerates candidate arbitrage
//! opportunities across pools trading the same canonical token pair and
//! sizes each with a bounded golden-section search.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod amm;
pub mod golden_section;

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::types::{Pool, RawOpportunity, SwapDirection};

/// Reject a pair immediately when the spread is less than 1.5x the combined
/// fee — the fees alone would exceed any price gap.
const SPREAD_PREFILTER_MULTIPLIER: f64 = 1.5;

/// Flash-loan fee charged by the borrow pool, in basis points.
const FLASH_FEE_BPS: u32 = 5;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub min_borrow: f64,
    pub max_borrow: f64,
    pub max_liquidity_fraction: f64,
    pub precision: f64,
    pub min_profit_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_borrow: 0.01,
            max_borrow: 5.0,
            max_liquidity_fraction: 0.1,
            precision: 1e-3,
            min_profit_floor: 0.0,
        }
    }
}

pub struct ProfitEngine {
    config: EngineConfig,
}

impl ProfitEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Enumerate and size candidate opportunities across the current pool
    /// snapshot. Output is sorted by descending net profit.
    pub fn scan(&self, pools: &[Pool]) -> Vec<RawOpportunity> {
        let mut groups: HashMap<(Address, Address), Vec<&Pool>> = HashMap::new();
        for pool in pools {
            if !pool.is_initialized() || pool.liquidity == 0 {
                continue;
            }
            groups.entry(pool.pair_key()).or_default().push(pool);
        }

        let mut opportunities = Vec::new();
        for pair_pools in groups.values() {
            if pair_pools.len() < 2 {
                continue;
            }
            for i in 0..pair_pools.len() {
                for j in (i + 1)..pair_pools.len() {
                    if let Some(opp) = self.consider_pair(pair_pools[i], pair_pools[j]) {
                        opportunities.push(opp);
                    }
                }
            }
        }

        opportunities.sort_by(|a, b| {
            b.estimated_net_profit
                .partial_cmp(&a.estimated_net_profit)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        opportunities
    }

    fn consider_pair(&self, pool_a: &Pool, pool_b: &Pool) -> Option<RawOpportunity> {
        let price_a = pool_a.price_0_to_1();
        let price_b = pool_b.price_0_to_1();
        if price_a <= 0.0 || price_b <= 0.0 {
            return None;
        }

        let spread = (price_a - price_b).abs() / price_a.min(price_b);
        let fee_floor = SPREAD_PREFILTER_MULTIPLIER * (pool_a.fee + pool_b.fee) as f64 / 10_000.0 / 100.0;
        if spread < fee_floor {
            debug!(spread, fee_floor, "spread below prefilter, rejecting pair");
            return None;
        }

        let (pool_low, pool_high) = if price_a < price_b { (pool_a, pool_b) } else { (pool_b, pool_a) };

        let x_min = self.config.min_borrow;
        let liquidity_cap = (pool_low.liquidity.min(pool_high.liquidity) as f64) * self.config.max_liquidity_fraction;
        let x_max = self.config.max_borrow.min(liquidity_cap);

        let sqrt_low = pool_low.sqrt_price_normalized();
        let sqrt_high = pool_high.sqrt_price_normalized();
        let l_low = pool_low.liquidity as f64;
        let l_high = pool_high.liquidity as f64;

        // Borrow token0 from pool_low, swap into token1 there, then swap
        // token1 back into token0 at pool_high.
        let objective_zero_for_one = |x: f64| {
            amm::net_profit(
                x,
                sqrt_low,
                l_low,
                pool_low.fee,
                sqrt_high,
                l_high,
                pool_high.fee,
                SwapDirection::ZeroForOne,
                FLASH_FEE_BPS,
            )
        };
        let result_zero_for_one = golden_section::search(x_min, x_max, self.config.precision, objective_zero_for_one);

        // Mirror image (spec.md §4.3): borrow token1 from pool_high, swap
        // into token0 there, then swap token0 back into token1 at pool_low.
        let objective_one_for_zero = |x: f64| {
            amm::net_profit(
                x,
                sqrt_high,
                l_high,
                pool_high.fee,
                sqrt_low,
                l_low,
                pool_low.fee,
                SwapDirection::OneForZero,
                FLASH_FEE_BPS,
            )
        };
        let result_one_for_zero = golden_section::search(x_min, x_max, self.config.precision, objective_one_for_zero);

        let (direction, result) = if result_one_for_zero.best_value > result_zero_for_one.best_value {
            (SwapDirection::OneForZero, result_one_for_zero)
        } else {
            (SwapDirection::ZeroForOne, result_zero_for_one)
        };

        if result.best_value <= self.config.min_profit_floor {
            return None;
        }

        let amount_in = result.best_x;
        let (borrow_token, target_token, entry_pool, entry_fee, exit_pool, exit_fee, swap1_out, swap2_out) = match direction {
            SwapDirection::ZeroForOne => {
                let swap1_out = amm::swap_out(amount_in, sqrt_low, l_low, pool_low.fee, SwapDirection::ZeroForOne);
                let swap2_out = amm::swap_out(swap1_out, sqrt_high, l_high, pool_high.fee, SwapDirection::OneForZero);
                (
                    pool_low.token0,
                    pool_low.token1,
                    pool_low.address,
                    pool_low.fee,
                    pool_high.address,
                    pool_high.fee,
                    swap1_out,
                    swap2_out,
                )
            }
            SwapDirection::OneForZero => {
                let swap1_out = amm::swap_out(amount_in, sqrt_high, l_high, pool_high.fee, SwapDirection::OneForZero);
                let swap2_out = amm::swap_out(swap1_out, sqrt_low, l_low, pool_low.fee, SwapDirection::ZeroForOne);
                (
                    pool_low.token1,
                    pool_low.token0,
                    pool_high.address,
                    pool_high.fee,
                    pool_low.address,
                    pool_low.fee,
                    swap1_out,
                    swap2_out,
                )
            }
        };
        let flash_fee = amount_in * FLASH_FEE_BPS as f64 / 10_000.0;

        Some(RawOpportunity {
            pool_low: pool_low.address,
            pool_high: pool_high.address,
            borrow_token,
            target_token,
            fee_low: pool_low.fee,
            fee_high: pool_high.fee,
            entry_pool,
            entry_fee,
            exit_pool,
            exit_fee,
            amount_in: f64_to_wei(amount_in),
            estimated_swap1_out: f64_to_wei(swap1_out),
            estimated_swap2_out: f64_to_wei(swap2_out),
            estimated_flash_fee: f64_to_wei(flash_fee),
            estimated_net_profit: result.best_value,
            direction,
            direction_label: format!(
                "{:#x}/{:#x} low({})->high({}) {}",
                pool_low.token0,
                pool_low.token1,
                pool_low.address,
                pool_high.address,
                if direction == SwapDirection::ZeroForOne { "low->high" } else { "high->low" }
            ),
        })
    }
}

/// Convert a float ETH-denominated amount to its 18-decimal wei
/// representation, saturating on overflow/negative input.
fn f64_to_wei(amount: f64) -> U256 {
    if amount <= 0.0 || !amount.is_finite() {
        return U256::ZERO;
    }
    let scaled = amount * 1e18;
    U256::try_from(scaled as u128).unwrap_or(U256::ZERO)
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

    fn pool_at_price(address: Address, token0: Address, token1: Address, sqrt_price: &str, fee: u32, liquidity: u128) -> Pool {
        let mut pool = Pool::new(address, token0, token1, 18, 18, fee);
        pool.sqrt_price_x96 = U256::from_str(sqrt_price).unwrap();
        pool.liquidity = liquidity;
        pool
    }

    #[test]
    fn identical_prices_yield_no_opportunity() {
        let t0 = addr(1);
        let t1 = addr(2);
        let pools = vec![
            pool_at_price(addr(10), t0, t1, "79228162514264337593543950336", 500, 10u128.pow(22)),
            pool_at_price(addr(11), t0, t1, "79228162514264337593543950336", 3000, 10u128.pow(22)),
        ];
        let engine = ProfitEngine::new(EngineConfig::default());
        let opps = engine.scan(&pools);
        assert!(opps.is_empty());
    }

    #[test]
    fn large_price_delta_yields_opportunity_bounded_by_liquidity() {
        let t0 = addr(1);
        let t1 = addr(2);
        // ~4% higher sqrt price on the second pool roughly matches Scenario B.
        let high_sqrt = "80772725764549644345334909342";
        let pools = vec![
            pool_at_price(addr(10), t0, t1, "79228162514264337593543950336", 500, 10u128.pow(22)),
            pool_at_price(addr(11), t0, t1, high_sqrt, 3000, 10u128.pow(22)),
        ];
        let engine = ProfitEngine::new(EngineConfig::default());
        let opps = engine.scan(&pools);
        assert!(!opps.is_empty());
        assert!(opps[0].estimated_net_profit > 0.0);
    }

    #[test]
    fn zero_liquidity_pool_is_filtered_before_search() {
        let t0 = addr(1);
        let t1 = addr(2);
        let pools = vec![
            pool_at_price(addr(10), t0, t1, "79228162514264337593543950336", 500, 0),
            pool_at_price(addr(11), t0, t1, "80772725764549644345334909342", 3000, 10u128.pow(22)),
        ];
        let engine = ProfitEngine::new(EngineConfig::default());
        let opps = engine.scan(&pools);
        assert!(opps.is_empty());
    }

    #[test]
    fn uninitialized_pool_is_skipped_without_panic() {
        let t0 = addr(1);
        let t1 = addr(2);
        let mut uninitialized = Pool::new(addr(10), t0, t1, 18, 18, 500);
        uninitialized.liquidity = 10u128.pow(22);
        let pools = vec![uninitialized, pool_at_price(addr(11), t0, t1, "80772725764549644345334909342", 3000, 10u128.pow(22))];
        let engine = ProfitEngine::new(EngineConfig::default());
        let opps = engine.scan(&pools);
        assert!(opps.is_empty());
    }
}
