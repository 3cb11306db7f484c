//! SafetyLayer — quoter verification, OP-Stack cost accounting, and
//! slippage-protected output floors.
//!
//! Re-computes an opportunity's profitability against the real on-chain
//! quoter before anything is signed. The single-tick local approximation is
//! superseded entirely by the quoter's output for all downstream accounting.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

pub mod l1_fee;

use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use tracing::{debug, warn};

use crate::contracts::{IGasPriceOracle, IQuoterV2};
use crate::error::CoreError;
use crate::rpc::RpcPool;
use crate::types::{RawOpportunity, VerifiedOpportunity};
use l1_fee::L1FeeCache;
use std::sync::Arc;

/// `startArbitrage(pool, tokenBorrow, amount, swapData)` calldata is a
/// small, near-fixed-size payload (a handful of statically-sized words);
/// this is used as the data-gas estimate until the Executor builds the
/// real calldata and can ask the oracle directly via `getL1Fee`.
const ESTIMATED_CALLDATA_LEN: usize = 292;

#[derive(Debug, Clone)]
pub struct SafetyConfig {
    pub slippage_bps: u64,
    pub max_ticks_crossed: u32,
    pub l2_gas_price_wei: u128,
    pub gas_estimate_fallback: u128,
    pub l1_fee_cache_ttl_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            slippage_bps: 50,
            max_ticks_crossed: 3,
            l2_gas_price_wei: 1_000_000,
            gas_estimate_fallback: 250_000,
            l1_fee_cache_ttl_ms: 2000,
        }
    }
}

struct QuotedLeg {
    amount_out: U256,
    ticks_crossed: u32,
    gas_estimate: U256,
}

pub struct SafetyLayer<P: Provider + Clone> {
    rpc_pool: Arc<RpcPool<P>>,
    quoter_address: Address,
    gas_oracle_address: Address,
    l1_fee_cache: L1FeeCache,
    config: SafetyConfig,
}

impl<P: Provider + Clone> SafetyLayer<P> {
    pub fn new(rpc_pool: Arc<RpcPool<P>>, quoter_address: Address, gas_oracle_address: Address, config: SafetyConfig) -> Self {
        let ttl = config.l1_fee_cache_ttl_ms;
        Self {
            rpc_pool,
            quoter_address,
            gas_oracle_address,
            l1_fee_cache: L1FeeCache::new(ttl),
            config,
        }
    }

    async fn quote_leg(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<Option<QuotedLeg>, CoreError> {
        let quoter = IQuoterV2::new(self.quoter_address, self.rpc_pool.current());
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::from(fee),
            sqrtPriceLimitX96: U160::ZERO,
        };

        match quoter.quoteExactInputSingle(params).call().await {
            Ok(result) => Ok(Some(QuotedLeg {
                amount_out: result.amountOut,
                ticks_crossed: result.initializedTicksCrossed,
                gas_estimate: result.gasEstimate,
            })),
            Err(err) => {
                debug!(error = %err, "quoter reverted, rejecting opportunity");
                Ok(None)
            }
        }
    }

    async fn refresh_l1_fee_params(&self) -> Result<(), CoreError> {
        if self.l1_fee_cache.get_fresh().is_some() {
            return Ok(());
        }
        let oracle = IGasPriceOracle::new(self.gas_oracle_address, self.rpc_pool.current());
        let l1_base_fee = oracle
            .l1BaseFee()
            .call()
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?;
        let overhead = oracle
            .overhead()
            .call()
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?;
        let scalar = oracle
            .scalar()
            .call()
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?;

        self.l1_fee_cache.set(
            u256_to_u128_saturating(l1_base_fee),
            u256_to_u128_saturating(overhead),
            u256_to_u128_saturating(scalar),
        );
        Ok(())
    }

    /// Minimum output with the configured slippage tolerance applied.
    /// Never returns 0 — a zero `min_out` would admit JIT/sandwich attacks.
    fn slippage_floor(&self, quoted: U256) -> U256 {
        let floored = quoted.saturating_mul(U256::from(10_000 - self.config.slippage_bps)) / U256::from(10_000u64);
        if floored.is_zero() {
            U256::from(1u64)
        } else {
            floored
        }
    }

    /// Re-quote both legs through the real quoter, compute the net profit
    /// after full L2+L1 cost accounting, and produce a `VerifiedOpportunity`
    /// if it clears `min_profit_floor`. Returns `Ok(None)` if either quote
    /// reverts or the opportunity doesn't clear the floor.
    pub async fn verify(
        &self,
        raw: RawOpportunity,
        min_profit_floor: U256,
    ) -> Result<Option<VerifiedOpportunity>, CoreError> {
        let Some(leg1) = self
            .quote_leg(raw.borrow_token, raw.target_token, raw.amount_in, raw.entry_fee)
            .await?
        else {
            return Ok(None);
        };

        let Some(leg2) = self
            .quote_leg(raw.target_token, raw.borrow_token, leg1.amount_out, raw.exit_fee)
            .await?
        else {
            return Ok(None);
        };

        self.refresh_l1_fee_params().await?;
        let l1_params = self.l1_fee_cache.get_fresh().ok_or_else(|| CoreError::Other("l1 fee cache empty after refresh".into()))?;

        let l2_gas_estimate = u256_to_u128_saturating(leg1.gas_estimate + leg2.gas_estimate);
        let l2_gas_estimate = if l2_gas_estimate == 0 {
            self.config.gas_estimate_fallback
        } else {
            l2_gas_estimate
        };
        let l2_cost = l2_gas_estimate.saturating_mul(self.config.l2_gas_price_wei);
        let l1_cost = l1_params.l1_data_fee(ESTIMATED_CALLDATA_LEN);
        let total_tx_cost_wei = l2_cost.saturating_add(l1_cost);

        let gross_out = u256_to_i128_saturating(leg2.amount_out);
        let amount_in = u256_to_i128_saturating(raw.amount_in);
        let flash_fee = u256_to_i128_saturating(raw.estimated_flash_fee);
        let net_profit_after_gas = gross_out - amount_in - flash_fee - total_tx_cost_wei as i128;

        if net_profit_after_gas <= 0 || U256::from(net_profit_after_gas.max(0) as u128) <= min_profit_floor {
            debug!(net_profit_after_gas, "opportunity rejected: below profit floor after gas");
            return Ok(None);
        }

        if leg1.ticks_crossed > self.config.max_ticks_crossed || leg2.ticks_crossed > self.config.max_ticks_crossed {
            warn!(
                ticks1 = leg1.ticks_crossed,
                ticks2 = leg2.ticks_crossed,
                "opportunity crosses more ticks than configured threshold"
            );
        }

        Ok(Some(VerifiedOpportunity {
            min_out_swap1: self.slippage_floor(leg1.amount_out),
            min_out_swap2: self.slippage_floor(leg2.amount_out),
            quoted_swap1_out: leg1.amount_out,
            quoted_swap2_out: leg2.amount_out,
            ticks_crossed_1: leg1.ticks_crossed,
            ticks_crossed_2: leg2.ticks_crossed,
            total_tx_cost_wei: U256::from(total_tx_cost_wei),
            net_profit_after_gas,
            raw,
        }))
    }
}

fn u256_to_u128_saturating(value: U256) -> u128 {
    value.try_into().unwrap_or(u128::MAX)
}

fn u256_to_i128_saturating(value: U256) -> i128 {
    let as_u128: u128 = value.try_into().unwrap_or(u128::MAX);
    as_u128.min(i128::MAX as u128) as i128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slippage_floor_never_zero() {
        let config = SafetyConfig::default();
        // We can't build a full Provider in a unit test; exercise the pure
        // math via a throwaway struct with the same formula instead.
        let quoted = U256::from(1u64);
        let floored = quoted.saturating_mul(U256::from(10_000 - config.slippage_bps)) / U256::from(10_000u64);
        let result = if floored.is_zero() { U256::from(1u64) } else { floored };
        assert_eq!(result, U256::from(1u64));
    }

    #[test]
    fn u256_conversions_saturate_instead_of_panicking() {
        assert_eq!(u256_to_u128_saturating(U256::from(42u64)), 42u128);
        assert_eq!(u256_to_i128_saturating(U256::from(42u64)), 42i128);
    }
}
