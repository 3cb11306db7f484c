//! Executor — builds, simulates, signs, broadcasts, and if necessary
//! replaces the transaction for an approved opportunity.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

pub mod cooldown;
pub mod gas_cache;
pub mod nonce_cache;
pub mod private_tx;
pub mod replacement;

use std::sync::Arc;
use std::time::Instant;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{AccessList, AccessListItem, TransactionRequest};
use alloy::sol_types::{SolCall, SolValue};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::contracts::{IERC20, IFlashArbExecutor};
use crate::error::{CoreError, SimOutcome};
use crate::rpc::RpcPool;
use crate::types::{AttemptStatus, SignedAttempt, VerifiedOpportunity};
use cooldown::TokenCooldown;
use gas_cache::GasCacheHandle;
use nonce_cache::NonceCacheHandle;
use private_tx::PrivateTransactionManager;
use replacement::{ReplacementOutcome, ReplacementRpc};

/// Outcome of a full execution attempt, including whatever on-chain
/// evidence (hash, gas used) the attempt produced — carried through to the
/// execution journal (§6: "tx hash (or N/A)", "gas used").
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    pub status: AttemptStatus,
    pub tx_hash: Option<String>,
    pub gas_used: Option<u64>,
}

/// Floor on priority fee per gas (0.01 gwei) per §4.5.1.
const MIN_PRIORITY_FEE_WEI: u128 = 10_000_000;

/// Threshold separating a "soft fail" (gas used too low to have actually
/// attempted the swap) from a true revert. Tunable, not a semantic
/// constant, per the source's own documented intent.
const SOFT_FAIL_GAS_THRESHOLD: u64 = 80_000;

#[derive(Debug, Clone, Copy)]
pub enum BroadcastMode {
    PublicMempool,
    PrivateRpc,
    BundleSimulationThenPrivate,
}

/// EIP-1559 fee construction (§4.5.1).
///
/// `priority_fee = max(suggested_priority_fee * sniper_multiplier, 0.01 gwei)`,
/// `max_fee = base_fee * 2 + priority_fee`. Both capped at `max_gas_gwei`; on
/// cap, priority fee is scaled down so the cap applies to `max_fee`.
pub fn construct_fees(
    base_fee_per_gas: u128,
    suggested_priority_fee: u128,
    sniper_multiplier: f64,
    max_gas_gwei: u64,
) -> (u128, u128) {
    let sniped = (suggested_priority_fee as f64 * sniper_multiplier) as u128;
    let priority_fee = sniped.max(MIN_PRIORITY_FEE_WEI);
    let max_fee = base_fee_per_gas.saturating_mul(2).saturating_add(priority_fee);

    let cap_wei = max_gas_gwei as u128 * 1_000_000_000;
    if max_fee > cap_wei {
        let scale = cap_wei as f64 / max_fee as f64;
        let scaled_priority = (priority_fee as f64 * scale) as u128;
        (cap_wei, scaled_priority)
    } else {
        (max_fee, priority_fee)
    }
}

/// ABI-encodes `swapData = (target_token, target_fee, min_amount_out)` and
/// wraps it in the `startArbitrage` call, per §4.5.3 / §6.
pub fn build_calldata(pool: Address, token_borrow: Address, amount: U256, target_token: Address, target_fee: u32, min_amount_out: U256) -> Bytes {
    let swap_data = (target_token, target_fee, min_amount_out).abi_encode_params();
    let call = IFlashArbExecutor::startArbitrageCall {
        pool,
        tokenBorrow: token_borrow,
        amount,
        swapData: swap_data.into(),
    };
    Bytes::from(call.abi_encode())
}

/// Builds the EIP-2930 access list covering the five contracts guaranteed to
/// be touched: the flash pool, both tokens, the router, and the executor
/// contract itself. Warming these moves cold SLOADs to warm SLOADs.
pub fn build_access_list(pool: Address, token0: Address, token1: Address, router: Address, executor_contract: Address) -> AccessList {
    build_access_list_from(&[pool, token0, token1, router, executor_contract])
}

fn build_access_list_from(targets: &[Address]) -> AccessList {
    AccessList::from(
        targets
            .iter()
            .map(|&address| AccessListItem { address, storage_keys: vec![] })
            .collect::<Vec<_>>(),
    )
}

/// Classifies a broadcast-time RPC error message into the nonce-conflict
/// variants §7 calls out, falling back to a generic network error.
fn classify_broadcast_error(message: &str) -> CoreError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("nonce too low") {
        CoreError::NonceTooLow
    } else if lower.contains("replacement") && lower.contains("underpriced") {
        CoreError::ReplacementUnderpriced
    } else {
        CoreError::Network(message.to_string())
    }
}

pub struct Executor<P: Provider + Clone> {
    rpc_pool: Arc<RpcPool<P>>,
    wallet: EthereumWallet,
    config: Config,
    signer_address: Address,
    executor_contract: Address,
    gas_cache: GasCacheHandle,
    nonce_cache: NonceCacheHandle,
    cooldown: TokenCooldown,
    private_tx: PrivateTransactionManager,
}

impl<P: Provider + Clone> Executor<P> {
    pub fn new(rpc_pool: Arc<RpcPool<P>>, wallet: EthereumWallet, config: Config, signer_address: Address, executor_contract: Address) -> Self {
        let private_tx = PrivateTransactionManager::new(
            config.private_tx.private_rpc_urls.clone(),
            config.private_tx.bundle_simulation_rpc.clone(),
        );
        let cooldown = TokenCooldown::new(
            60,
            config.cooldown.failure_pause_secs,
            config.cooldown.max_consecutive_failures,
        );
        Self {
            rpc_pool,
            wallet,
            config,
            signer_address,
            executor_contract,
            gas_cache: GasCacheHandle::default(),
            nonce_cache: NonceCacheHandle::default(),
            cooldown,
            private_tx,
        }
    }

    fn broadcast_mode(&self) -> BroadcastMode {
        if !self.config.private_tx.enabled {
            BroadcastMode::PublicMempool
        } else if self.private_tx.has_bundle_simulation() {
            BroadcastMode::BundleSimulationThenPrivate
        } else {
            BroadcastMode::PrivateRpc
        }
    }

    /// Transform an approved opportunity into a confirmed on-chain
    /// transaction, or fail fast. Every recoverable failure is confined to
    /// this opportunity; the caller's scan loop continues regardless.
    pub async fn execute(&self, opportunity: VerifiedOpportunity) -> Result<ExecutionReceipt, CoreError> {
        if self.cooldown.is_cooled_down(opportunity.raw.target_token) {
            info!(target = %opportunity.raw.target_token, "token in cooldown, skipping opportunity");
            return Ok(ExecutionReceipt {
                status: AttemptStatus::RejectedPreflight,
                tx_hash: None,
                gas_used: None,
            });
        }

        let start = Instant::now();

        let nonce = match self.nonce_cache.take_next() {
            Some(n) => n,
            None => {
                let fetched = self
                    .rpc_pool
                    .current()
                    .get_transaction_count(self.signer_address)
                    .await
                    .map_err(|e| CoreError::Network(e.to_string()))?;
                self.nonce_cache.prime(fetched);
                self.nonce_cache.take_next().unwrap_or(fetched)
            }
        };

        let (max_fee_per_gas, max_priority_fee_per_gas) = self.current_fees().await?;

        let calldata = build_calldata(
            opportunity.raw.entry_pool,
            opportunity.raw.borrow_token,
            opportunity.raw.amount_in,
            opportunity.raw.target_token,
            opportunity.raw.exit_fee,
            opportunity.min_out_swap2,
        );

        let access_list_targets = vec![
            opportunity.raw.entry_pool,
            opportunity.raw.borrow_token,
            opportunity.raw.target_token,
            self.config.swap_router,
            self.executor_contract,
        ];

        match self.simulate(&calldata, &opportunity).await {
            Ok(true) => {}
            Ok(false) => {
                self.nonce_cache.invalidate();
                self.cooldown.record_failure(opportunity.raw.target_token);
                return Ok(ExecutionReceipt {
                    status: AttemptStatus::RejectedPreflight,
                    tx_hash: None,
                    gas_used: None,
                });
            }
            Err(err) => {
                self.nonce_cache.invalidate();
                self.cooldown.record_failure(opportunity.raw.target_token);
                return Err(err);
            }
        }

        if self.config.dry_run {
            info!(nonce, "dry run: skipping broadcast");
            return Ok(ExecutionReceipt {
                status: AttemptStatus::Confirmed,
                tx_hash: None,
                gas_used: None,
            });
        }

        let target_token = opportunity.raw.target_token;
        let signed = SignedAttempt {
            opportunity,
            nonce,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            calldata,
            access_list_targets,
            hashes: vec![],
            speedup_count: 0,
        };

        let first_hash = match self.broadcast(&signed).await {
            Ok(hash) => hash,
            Err(err) => {
                self.nonce_cache.invalidate();
                self.cooldown.record_failure(target_token);
                error!(error = %err, "broadcast failed");
                return Err(err);
            }
        };

        let replacement_rpc = ExecutionReplacementRpc {
            executor: self,
            nonce: signed.nonce,
            calldata: signed.calldata.clone(),
            access_list_targets: signed.access_list_targets.clone(),
        };

        let outcome = replacement::monitor(
            &replacement_rpc,
            &self.config.replacement,
            first_hash,
            signed.max_fee_per_gas,
            signed.max_priority_fee_per_gas,
        )
        .await?;

        let receipt = match outcome {
            ReplacementOutcome::Confirmed { hash, .. } => {
                let gas_used = self.fetch_receipt(&hash).await?.map(|(_, gas)| gas);
                self.cooldown.record_success(target_token);
                info!(elapsed_ms = start.elapsed().as_millis(), hash, "execution attempt confirmed");
                ExecutionReceipt {
                    status: AttemptStatus::Confirmed,
                    tx_hash: Some(hash),
                    gas_used,
                }
            }
            ReplacementOutcome::TimedOut { hashes, .. } => {
                let (status, tx_hash, gas_used) = self.classify_timed_out(&hashes).await;
                self.nonce_cache.invalidate();
                self.cooldown.record_failure(target_token);
                warn!(?status, ?tx_hash, "execution attempt did not confirm within replacement window");
                ExecutionReceipt { status, tx_hash, gas_used }
            }
        };

        Ok(receipt)
    }

    /// Fetches a receipt's success flag and gas used, if mined.
    async fn fetch_receipt(&self, hash: &str) -> Result<Option<(bool, u64)>, CoreError> {
        let parsed: B256 = hash.parse().map_err(|_| CoreError::Other(format!("invalid tx hash: {hash}")))?;
        match self.rpc_pool.current().get_transaction_receipt(parsed).await {
            Ok(Some(receipt)) => Ok(Some((receipt.status(), receipt.gas_used))),
            Ok(None) => Ok(None),
            Err(err) => Err(CoreError::Network(err.to_string())),
        }
    }

    /// After the replacement monitor times out, check every broadcast hash
    /// once more for a late-arriving receipt so the journal records the real
    /// outcome instead of a blanket timeout when one actually mined.
    async fn classify_timed_out(&self, hashes: &[String]) -> (AttemptStatus, Option<String>, Option<u64>) {
        for hash in hashes.iter().rev() {
            match self.fetch_receipt(hash).await {
                Ok(Some((true, gas_used))) => return (AttemptStatus::Confirmed, Some(hash.clone()), Some(gas_used)),
                Ok(Some((false, gas_used))) => return (classify_onchain_failure(gas_used), Some(hash.clone()), Some(gas_used)),
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, hash, "failed to re-check receipt after timeout");
                    continue;
                }
            }
        }
        (AttemptStatus::Timeout, hashes.last().cloned(), None)
    }

    async fn current_fees(&self) -> Result<(u128, u128), CoreError> {
        if let Some(cached) = self.gas_cache.get_fresh() {
            return Ok(construct_fees(
                cached.base_fee_per_gas,
                cached.priority_fee_per_gas,
                self.config.sniper_mode_multiplier,
                self.config.max_gas_gwei,
            ));
        }

        let provider = self.rpc_pool.current();
        let base_fee = provider.get_gas_price().await.map_err(|e| CoreError::Network(e.to_string()))?;
        let priority_fee = provider.get_max_priority_fee_per_gas().await.unwrap_or(MIN_PRIORITY_FEE_WEI);

        self.gas_cache.set(base_fee, priority_fee);
        Ok(construct_fees(base_fee, priority_fee, self.config.sniper_mode_multiplier, self.config.max_gas_gwei))
    }

    /// Pre-flight simulation (strict mode, §4.5.4). Performs an `eth_call`
    /// against `calldata` from the signer's address at the latest block.
    /// Returns `Ok(true)` only if the call doesn't revert. In strict mode,
    /// additionally reads the counterparty contract's borrowed-token balance
    /// before and after the call and only accepts the attempt if the
    /// balance would strictly increase — this is the single most important
    /// cost-saving check in the system.
    async fn simulate(&self, calldata: &Bytes, opportunity: &VerifiedOpportunity) -> Result<bool, CoreError> {
        let balance_before = if self.config.strict_simulation_check {
            Some(self.token_balance(opportunity.raw.borrow_token, self.executor_contract).await?)
        } else {
            None
        };

        let tx = TransactionRequest::default()
            .with_from(self.signer_address)
            .with_to(self.executor_contract)
            .with_input(calldata.clone());

        let call_result = self.rpc_pool.current().call(tx).await;

        let Err(err) = call_result else {
            if let Some(before) = balance_before {
                let after = self.token_balance(opportunity.raw.borrow_token, self.executor_contract).await?;
                if after <= before {
                    warn!(before = %before, after = %after, "simulation passed but balance would not strictly increase");
                    return Ok(false);
                }
            }
            return Ok(true);
        };

        let outcome = SimOutcome::from_revert(&err.to_string());
        debug!(?outcome, "pre-flight simulation reverted");
        Ok(false)
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, CoreError> {
        let erc20 = IERC20::new(token, self.rpc_pool.current());
        erc20.balanceOf(holder).call().await.map_err(|e| CoreError::Network(e.to_string()))
    }

    /// Builds and locally signs the EIP-1559 transaction for `signed`,
    /// returning the RLP-encoded raw bytes. Signing happens once regardless
    /// of broadcast mode so the same raw bytes can go to a private relay or
    /// the public mempool.
    async fn sign_transaction(&self, signed: &SignedAttempt) -> Result<Bytes, CoreError> {
        let access_list = build_access_list_from(&signed.access_list_targets);

        let tx = TransactionRequest::default()
            .with_from(self.signer_address)
            .with_to(self.executor_contract)
            .with_nonce(signed.nonce)
            .with_chain_id(self.config.chain_id)
            .with_gas_limit(self.config.gas_limit)
            .with_max_fee_per_gas(signed.max_fee_per_gas)
            .with_max_priority_fee_per_gas(signed.max_priority_fee_per_gas)
            .with_input(signed.calldata.clone())
            .with_access_list(access_list);

        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|e| CoreError::Signing(e.to_string()))?;

        Ok(Bytes::from(alloy::eips::eip2718::Encodable2718::encoded_2718(&envelope)))
    }

    async fn broadcast(&self, signed: &SignedAttempt) -> Result<String, CoreError> {
        let raw_tx = self.sign_transaction(signed).await?;

        match self.broadcast_mode() {
            BroadcastMode::PublicMempool => self.broadcast_public(&raw_tx).await,
            BroadcastMode::PrivateRpc => match self.private_tx.submit(&raw_tx).await {
                Ok(hash) => Ok(hash),
                Err(_) => {
                    warn!("all private endpoints failed, falling back to public mempool");
                    self.broadcast_public(&raw_tx).await
                }
            },
            BroadcastMode::BundleSimulationThenPrivate => {
                let simulated_ok = self.private_tx.simulate_bundle(&raw_tx).await?;
                if !simulated_ok {
                    return Err(CoreError::Reverted("bundle simulation rejected".into()));
                }
                match self.private_tx.submit(&raw_tx).await {
                    Ok(hash) => Ok(hash),
                    Err(_) => self.broadcast_public(&raw_tx).await,
                }
            }
        }
    }

    async fn broadcast_public(&self, raw_tx: &Bytes) -> Result<String, CoreError> {
        match self.rpc_pool.current().send_raw_transaction(raw_tx).await {
            Ok(pending) => Ok(pending.tx_hash().to_string()),
            Err(err) => Err(classify_broadcast_error(&err.to_string())),
        }
    }

    /// Operator-invoked cancel path: a 0-value self-transfer at the given
    /// nonce with aggressive, capped fees, broadcast through the public
    /// mempool path. Reclaims a nonce left consumed by a stuck-tx monitor
    /// that hit its total timeout (§4.5.6 step 6).
    pub async fn cancel_nonce(&self, nonce: u64) -> Result<String, CoreError> {
        let (max_fee_per_gas, max_priority_fee_per_gas) = self.current_fees().await?;
        let cap_wei = self.config.replacement.max_gas_gwei as u128 * 1_000_000_000;
        let capped_fee = max_fee_per_gas.min(cap_wei);
        info!(nonce, capped_fee, max_priority_fee_per_gas, "broadcasting cancel transaction");

        let tx = TransactionRequest::default()
            .with_from(self.signer_address)
            .with_to(self.signer_address)
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_chain_id(self.config.chain_id)
            .with_gas_limit(21_000)
            .with_max_fee_per_gas(capped_fee)
            .with_max_priority_fee_per_gas(max_priority_fee_per_gas);

        let envelope = tx.build(&self.wallet).await.map_err(|e| CoreError::Signing(e.to_string()))?;
        let raw_tx = Bytes::from(alloy::eips::eip2718::Encodable2718::encoded_2718(&envelope));
        self.broadcast_public(&raw_tx).await
    }
}

/// Bridges the Executor's provider and signer to the provider-agnostic
/// `ReplacementRpc` trait the stuck-tx monitor polls/rebroadcasts through.
struct ExecutionReplacementRpc<'a, P: Provider + Clone> {
    executor: &'a Executor<P>,
    nonce: u64,
    calldata: Bytes,
    access_list_targets: Vec<Address>,
}

#[async_trait::async_trait]
impl<'a, P: Provider + Clone + Sync> ReplacementRpc for ExecutionReplacementRpc<'a, P> {
    async fn poll_receipt(&self, hash: &str) -> Result<Option<bool>, CoreError> {
        Ok(self.executor.fetch_receipt(hash).await?.map(|(success, _)| success))
    }

    async fn broadcast_replacement(&self, max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Result<String, CoreError> {
        let tx = TransactionRequest::default()
            .with_from(self.executor.signer_address)
            .with_to(self.executor.executor_contract)
            .with_nonce(self.nonce)
            .with_chain_id(self.executor.config.chain_id)
            .with_gas_limit(self.executor.config.gas_limit)
            .with_max_fee_per_gas(max_fee_per_gas)
            .with_max_priority_fee_per_gas(max_priority_fee_per_gas)
            .with_input(self.calldata.clone())
            .with_access_list(build_access_list_from(&self.access_list_targets));

        let envelope = tx
            .build(&self.executor.wallet)
            .await
            .map_err(|e| CoreError::Signing(e.to_string()))?;
        let raw_tx = Bytes::from(alloy::eips::eip2718::Encodable2718::encoded_2718(&envelope));

        self.executor.broadcast_public(&raw_tx).await
    }
}

/// Classifies a gas-used figure from an on-chain revert (after simulation
/// passed) as a soft fail vs a true revert, per §7.
pub fn classify_onchain_failure(gas_used: u64) -> AttemptStatus {
    if gas_used < SOFT_FAIL_GAS_THRESHOLD {
        AttemptStatus::SoftFail
    } else {
        AttemptStatus::Reverted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_construction_applies_sniper_multiplier() {
        let (max_fee, priority_fee) = construct_fees(1_000_000_000, 100_000_000, 2.0, 10);
        assert_eq!(priority_fee, 200_000_000);
        assert_eq!(max_fee, 2_200_000_000);
    }

    #[test]
    fn priority_fee_floor_applies_when_suggested_is_tiny() {
        let (_max_fee, priority_fee) = construct_fees(1_000_000_000, 1, 2.0, 10);
        assert_eq!(priority_fee, MIN_PRIORITY_FEE_WEI);
    }

    #[test]
    fn fee_construction_caps_max_fee_and_scales_priority_down() {
        let cap_wei = 10u128 * 1_000_000_000;
        let (max_fee, priority_fee) = construct_fees(50_000_000_000, 1_000_000_000, 2.0, 10);
        assert_eq!(max_fee, cap_wei);
        assert!(priority_fee < 2_000_000_000);
    }

    #[test]
    fn soft_fail_threshold_classifies_correctly() {
        assert_eq!(classify_onchain_failure(50_000), AttemptStatus::SoftFail);
        assert_eq!(classify_onchain_failure(150_000), AttemptStatus::Reverted);
    }

    #[test]
    fn access_list_covers_five_targets() {
        let list = build_access_list(Address::ZERO, Address::ZERO, Address::ZERO, Address::ZERO, Address::ZERO);
        assert_eq!(list.0.len(), 5);
    }
}
