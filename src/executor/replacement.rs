//! Stuck-transaction replacement monitor (§4.5.6).
//!
//! After broadcast: wait, poll every previously-broadcast hash for this
//! logical attempt, and if none has mined, construct and broadcast a
//! replacement at the same nonce with bumped fees. Repeats up to a bounded
//! number of attempts and a total wall-clock cap.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::ReplacementConfig;
use crate::error::CoreError;

/// Outcome of the monitoring loop.
#[derive(Debug, Clone)]
pub enum ReplacementOutcome {
    /// One of the broadcast hashes confirmed.
    Confirmed { hash: String, speedup_count: u32, final_gas_price_gwei: f64 },
    /// The wall-clock cap elapsed with no confirmation. The nonce remains
    /// consumed; the operator may reclaim it via the cancel path.
    TimedOut { hashes: Vec<String>, speedup_count: u32 },
}

/// Caller-supplied async polling/broadcast hooks — kept as plain trait
/// methods rather than a concrete RPC type so the monitor is independent of
/// which `Provider` implementation the rest of the Executor uses.
#[async_trait::async_trait]
pub trait ReplacementRpc {
    /// Returns `Some(true)` if `hash` is confirmed, `Some(false)` if mined
    /// but reverted, `None` if not yet mined.
    async fn poll_receipt(&self, hash: &str) -> Result<Option<bool>, CoreError>;

    /// Broadcasts a replacement transaction at the same nonce with the
    /// given bumped `max_fee_per_gas`/`max_priority_fee_per_gas` (wei).
    /// Returns the new hash, or `CoreError::NonceTooLow` if a prior hash
    /// has in fact already mined.
    async fn broadcast_replacement(&self, max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Result<String, CoreError>;
}

pub async fn monitor<R: ReplacementRpc>(
    rpc: &R,
    config: &ReplacementConfig,
    first_hash: String,
    initial_max_fee_per_gas: u128,
    initial_max_priority_fee_per_gas: u128,
) -> Result<ReplacementOutcome, CoreError> {
    let mut hashes = vec![first_hash];
    let mut max_fee_per_gas = initial_max_fee_per_gas;
    let mut max_priority_fee_per_gas = initial_max_priority_fee_per_gas;
    let mut speedup_count = 0u32;

    let total_deadline = Instant::now() + Duration::from_secs(config.total_timeout_secs);
    tokio::time::sleep(Duration::from_secs(config.initial_wait_secs)).await;

    loop {
        if let Some(hash) = poll_all(rpc, &hashes).await? {
            return Ok(ReplacementOutcome::Confirmed {
                hash,
                speedup_count,
                final_gas_price_gwei: max_fee_per_gas as f64 / 1e9,
            });
        }

        if !config.enabled || Instant::now() >= total_deadline || speedup_count >= config.max_speedup_attempts {
            return Ok(ReplacementOutcome::TimedOut { hashes, speedup_count });
        }

        let bumped_fee = max_fee_per_gas.saturating_mul(100 + config.bump_pct as u128) / 100;
        let bumped_priority = max_priority_fee_per_gas.saturating_mul(100 + config.bump_pct as u128) / 100;
        let cap_wei = config.max_gas_gwei as u128 * 1_000_000_000;

        if bumped_fee > cap_wei {
            warn!(bumped_fee, cap_wei, "replacement fee would exceed cap, exiting without further replacement");
            return Ok(ReplacementOutcome::TimedOut { hashes, speedup_count });
        }

        max_fee_per_gas = bumped_fee;
        max_priority_fee_per_gas = bumped_priority;

        match rpc.broadcast_replacement(max_fee_per_gas, max_priority_fee_per_gas).await {
            Ok(new_hash) => {
                info!(new_hash, speedup_count = speedup_count + 1, "replacement broadcast");
                hashes.push(new_hash);
                speedup_count += 1;
            }
            Err(CoreError::NonceTooLow) => {
                // One of the prior hashes has in fact mined; the error is
                // merely evidence of success, not a failure.
                if let Some(hash) = poll_all(rpc, &hashes).await? {
                    return Ok(ReplacementOutcome::Confirmed {
                        hash,
                        speedup_count,
                        final_gas_price_gwei: max_fee_per_gas as f64 / 1e9,
                    });
                }
                return Ok(ReplacementOutcome::TimedOut { hashes, speedup_count });
            }
            Err(err) => return Err(err),
        }

        tokio::time::sleep(Duration::from_secs(config.speedup_interval_secs)).await;
    }
}

async fn poll_all<R: ReplacementRpc>(rpc: &R, hashes: &[String]) -> Result<Option<String>, CoreError> {
    for hash in hashes {
        if let Some(true) = rpc.poll_receipt(hash).await? {
            return Ok(Some(hash.clone()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FakeRpc {
        confirm_after_polls: u32,
        poll_count: AtomicU32,
        broadcast_calls: Mutex<Vec<u128>>,
        nonce_too_low_once: bool,
    }

    #[async_trait::async_trait]
    impl ReplacementRpc for FakeRpc {
        async fn poll_receipt(&self, _hash: &str) -> Result<Option<bool>, CoreError> {
            let count = self.poll_count.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(count >= self.confirm_after_polls))
        }

        async fn broadcast_replacement(&self, max_fee_per_gas: u128, _max_priority_fee_per_gas: u128) -> Result<String, CoreError> {
            self.broadcast_calls.lock().unwrap().push(max_fee_per_gas);
            if self.nonce_too_low_once {
                return Err(CoreError::NonceTooLow);
            }
            Ok(format!("0xreplacement{}", self.broadcast_calls.lock().unwrap().len()))
        }
    }

    fn fast_config() -> ReplacementConfig {
        ReplacementConfig {
            enabled: true,
            initial_wait_secs: 0,
            speedup_interval_secs: 0,
            bump_pct: 15,
            max_gas_gwei: 50,
            max_speedup_attempts: 5,
            total_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn confirms_on_first_hash_without_replacement() {
        let rpc = FakeRpc {
            confirm_after_polls: 1,
            poll_count: AtomicU32::new(0),
            broadcast_calls: Mutex::new(vec![]),
            nonce_too_low_once: false,
        };
        let outcome = monitor(&rpc, &fast_config(), "0xh1".into(), 1_000_000_000, 100_000_000)
            .await
            .unwrap();
        match outcome {
            ReplacementOutcome::Confirmed { hash, speedup_count, .. } => {
                assert_eq!(hash, "0xh1");
                assert_eq!(speedup_count, 0);
            }
            _ => panic!("expected confirmation"),
        }
    }

    #[tokio::test]
    async fn replaces_once_then_confirms() {
        let rpc = FakeRpc {
            confirm_after_polls: 2,
            poll_count: AtomicU32::new(0),
            broadcast_calls: Mutex::new(vec![]),
            nonce_too_low_once: false,
        };
        let outcome = monitor(&rpc, &fast_config(), "0xh1".into(), 1_000_000_000, 100_000_000)
            .await
            .unwrap();
        match outcome {
            ReplacementOutcome::Confirmed { speedup_count, .. } => {
                assert_eq!(speedup_count, 1);
            }
            _ => panic!("expected confirmation after one replacement"),
        }
        assert_eq!(rpc.broadcast_calls.lock().unwrap().len(), 1);
        assert_eq!(rpc.broadcast_calls.lock().unwrap()[0], 1_150_000_000);
    }

    #[tokio::test]
    async fn nonce_too_low_rechecks_prior_hashes() {
        let rpc = FakeRpc {
            confirm_after_polls: 2,
            poll_count: AtomicU32::new(0),
            broadcast_calls: Mutex::new(vec![]),
            nonce_too_low_once: true,
        };
        let outcome = monitor(&rpc, &fast_config(), "0xh1".into(), 1_000_000_000, 100_000_000)
            .await
            .unwrap();
        assert!(matches!(outcome, ReplacementOutcome::Confirmed { .. }));
    }

    #[tokio::test]
    async fn exceeding_fee_cap_stops_replacement() {
        let rpc = FakeRpc {
            confirm_after_polls: u32::MAX,
            poll_count: AtomicU32::new(0),
            broadcast_calls: Mutex::new(vec![]),
            nonce_too_low_once: false,
        };
        let mut config = fast_config();
        config.max_gas_gwei = 1;
        let outcome = monitor(&rpc, &config, "0xh1".into(), 1_000_000_000, 100_000_000)
            .await
            .unwrap();
        assert!(matches!(outcome, ReplacementOutcome::TimedOut { .. }));
        assert_eq!(rpc.broadcast_calls.lock().unwrap().len(), 0);
    }
}
