//! Atomic concentrated-liquidity arbitrage core for Base L2 — entry point.
//!
//! Wires configuration, the RPC failover pool, pool registration, and the
//! scan loop (StateUpdater -> ProfitEngine -> SafetyLayer -> Executor)
//! together, and drains outstanding state on SIGINT/SIGTERM.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::Bytes;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing::{error, info, warn};

use basearb_core::config::{self, Config};
use basearb_core::contracts::IMulticall3;
use basearb_core::engine::{EngineConfig, ProfitEngine};
use basearb_core::executor::Executor;
use basearb_core::journal::{ExecutionJournal, JournalRecord};
use basearb_core::logging;
use basearb_core::registry::PoolRegistry;
use basearb_core::rpc::RpcPool;
use basearb_core::safety::{SafetyConfig, SafetyLayer};
use basearb_core::state::StateUpdater;
use basearb_core::types::AttemptStatus;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    logging::init(config.debug_mode);

    info!(chain_id = config.chain_id, dry_run = config.dry_run, "starting basearb-core");

    let signer: PrivateKeySigner = config.private_key.parse().context("invalid PRIVATE_KEY")?;
    let signer_address = signer.address();
    let wallet = EthereumWallet::from(signer);

    let mut endpoints = Vec::new();
    for (i, url) in std::iter::once(&config.rpc_url).chain(config.rpc_fallback_urls.iter()).enumerate() {
        let provider = ProviderBuilder::new()
            .wallet(wallet.clone())
            .connect_http(url.parse().with_context(|| format!("invalid RPC url at index {i}"))?);
        endpoints.push((url.clone(), provider));
    }
    let rpc_pool = Arc::new(RpcPool::new(endpoints, 3));

    let tokens: Vec<basearb_core::types::Token> = config
        .tokens
        .iter()
        .map(|t| basearb_core::types::Token {
            symbol: t.symbol.clone(),
            address: t.address,
            decimals: t.decimals,
            min_profit_floor: None,
            fee_tiers: config.fee_tiers.clone(),
        })
        .collect();
    let mut registry = PoolRegistry::derive_candidates(&tokens, &config.fee_tiers, config.v3_factory, config.pool_init_code_hash);

    let existence_responses = rpc_pool
        .execute_with_retry("verify_pool_existence", |provider| {
            let plan = registry.existence_check_plan();
            let multicall_address = config.multicall3;
            async move { verify_pool_existence(provider, multicall_address, &plan).await }
        })
        .await
        .context("failed to verify pool existence against every configured RPC endpoint")?;
    registry.retain_existing(&existence_responses);
    info!(pool_count = registry.pools().len(), "pool registry ready");

    let state_updater = StateUpdater::new(Arc::clone(&rpc_pool), config.multicall3, &registry);

    let engine = ProfitEngine::new(EngineConfig {
        min_borrow: config.min_borrow_eth,
        max_borrow: config.max_borrow_eth,
        max_liquidity_fraction: 0.1,
        precision: config.amount_precision_eth,
        min_profit_floor: config.min_profit_eth,
    });

    let safety = SafetyLayer::new(
        Arc::clone(&rpc_pool),
        config.quoter_v2,
        config.gas_price_oracle,
        SafetyConfig {
            slippage_bps: config.slippage_tolerance_bps,
            max_ticks_crossed: 3,
            l2_gas_price_wei: 1_000_000,
            gas_estimate_fallback: config.gas_limit as u128,
            l1_fee_cache_ttl_ms: 2000,
        },
    );

    let executor = Executor::new(Arc::clone(&rpc_pool), wallet.clone(), config.clone(), signer_address, config.flashbot_address);

    let mut journal = ExecutionJournal::new("data/execution_journal.csv").context("failed to open execution journal")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(Arc::clone(&shutdown))?;

    let min_profit_floor = alloy::primitives::U256::from((config.min_profit_eth * 1e18) as u128);
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(config.scan_interval_ms));

    info!("entering scan loop");
    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;

        if let Err(err) = state_updater.refresh(&registry).await {
            warn!(error = %err, "state refresh failed, skipping this cycle");
            continue;
        }

        let snapshot: Vec<_> = state_updater.pools().iter().map(|entry| entry.value().read().clone()).collect();
        let opportunities = engine.scan(&snapshot);

        for raw in opportunities {
            let direction_label = raw.direction_label.clone();
            let borrow_amount = raw.amount_in;
            let expected_profit = raw.estimated_net_profit;
            let borrow_token = raw.borrow_token;

            let symbol = config
                .tokens
                .iter()
                .find(|t| t.address == borrow_token)
                .map(|t| t.symbol.clone())
                .unwrap_or_else(|| format!("{borrow_token}"));

            match safety.verify(raw, min_profit_floor).await {
                Ok(Some(verified)) => {
                    let (status, tx_hash, gas_used) = match executor.execute(verified).await {
                        Ok(receipt) => (receipt.status, receipt.tx_hash, receipt.gas_used),
                        Err(err) => {
                            error!(error = %err, "execution attempt failed");
                            (AttemptStatus::Reverted, None, None)
                        }
                    };
                    let _ = journal.append(&JournalRecord {
                        token_symbol: symbol,
                        borrow_amount,
                        direction_label,
                        expected_profit,
                        tx_hash,
                        status,
                        gas_used,
                        actual_profit: None,
                        notes: None,
                    });
                }
                Ok(None) => {
                    info!(direction = %direction_label, "opportunity rejected by safety layer");
                }
                Err(err) => {
                    warn!(error = %err, "safety verification failed");
                }
            }
        }
    }

    info!("shutdown signal received, draining in-flight state");
    Ok(())
}

/// One `aggregate3` call over `plan`, returning `Some(data)` per leg that
/// succeeded and `None` for anything that reverted — the shape
/// `PoolRegistry::retain_existing` expects.
async fn verify_pool_existence<P: Provider + Clone>(
    provider: P,
    multicall_address: alloy::primitives::Address,
    plan: &[basearb_core::registry::PlannedCall],
) -> Result<Vec<Option<Bytes>>, basearb_core::CoreError> {
    let calls: Vec<IMulticall3::Call3> = plan
        .iter()
        .map(|call| IMulticall3::Call3 {
            target: call.target,
            allowFailure: true,
            callData: call.calldata.clone(),
        })
        .collect();

    let multicall = IMulticall3::new(multicall_address, provider);
    let result = multicall
        .aggregate3(calls)
        .call()
        .await
        .map_err(|e| basearb_core::CoreError::AggregateCallFailed(e.to_string()))?;

    Ok(result
        .returnData
        .into_iter()
        .map(|leg| if leg.success { Some(leg.returnData) } else { None })
        .collect())
}

fn spawn_shutdown_listener(shutdown: Arc<AtomicBool>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    tokio::spawn(async move {
        if signals.next().await.is_some() {
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        }
    });
    Ok(())
}
