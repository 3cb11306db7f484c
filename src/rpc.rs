//! RpcPool — health-tracked failover across configured RPC endpoints.
//!
//! Generalizes the source codebase's `NetworkManager` endpoint-health
//! tracking (consecutive-failure counting, EMA latency, reset-when-all-
//! unhealthy) to alloy's `Provider` abstraction: a thin rotation layer the
//! rest of the core calls through for anything that should survive a single
//! endpoint going bad, rather than a full transport reimplementation.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::CoreError;

/// Consecutive failures before an endpoint is marked unhealthy.
const UNHEALTHY_THRESHOLD: u32 = 3;
/// Base delay for 429 exponential backoff.
const BASE_BACKOFF_MS: u64 = 500;
/// Ceiling for 429 exponential backoff.
const MAX_BACKOFF_MS: u64 = 30_000;

struct EndpointHealth {
    label: String,
    is_healthy: bool,
    consecutive_failures: u32,
    avg_latency_ms: f64,
}

impl EndpointHealth {
    fn new(label: String) -> Self {
        Self { label, is_healthy: true, consecutive_failures: 0, avg_latency_ms: 0.0 }
    }

    fn record_success(&mut self, latency_ms: f64) {
        self.is_healthy = true;
        self.consecutive_failures = 0;
        self.avg_latency_ms = if self.avg_latency_ms == 0.0 { latency_ms } else { 0.8 * self.avg_latency_ms + 0.2 * latency_ms };
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= UNHEALTHY_THRESHOLD {
            self.is_healthy = false;
        }
    }
}

struct PoolState {
    health: Vec<EndpointHealth>,
    current_index: usize,
}

/// A rotation pool over `P` instances, one already bound per configured
/// endpoint (alloy providers are built once at startup per §5).
pub struct RpcPool<P> {
    providers: Vec<P>,
    state: Mutex<PoolState>,
    max_retries_per_endpoint: u32,
}

impl<P: Clone> RpcPool<P> {
    pub fn new(endpoints: Vec<(String, P)>, max_retries_per_endpoint: u32) -> Self {
        let health = endpoints.iter().map(|(label, _)| EndpointHealth::new(label.clone())).collect();
        let providers = endpoints.into_iter().map(|(_, p)| p).collect();
        Self {
            providers,
            state: Mutex::new(PoolState { health, current_index: 0 }),
            max_retries_per_endpoint,
        }
    }

    pub fn current(&self) -> P {
        let state = self.state.lock();
        self.providers[state.current_index].clone()
    }

    fn current_label(&self) -> String {
        let state = self.state.lock();
        state.health[state.current_index].label.clone()
    }

    /// Rotate to the next healthy endpoint, or reset all health and rotate
    /// anyway if none are healthy — mirrors the source's "reset and retry"
    /// fallback rather than giving up outright.
    fn rotate_to_next_healthy(&self) {
        let mut state = self.state.lock();
        let n = state.health.len();
        let original = state.current_index;

        for _ in 0..n {
            state.current_index = (state.current_index + 1) % n;
            if state.health[state.current_index].is_healthy {
                info!(endpoint = %state.health[state.current_index].label, "rotated to healthy rpc endpoint");
                return;
            }
        }

        warn!("all rpc endpoints unhealthy, resetting health and rotating anyway");
        for health in &mut state.health {
            health.is_healthy = true;
            health.consecutive_failures = 0;
        }
        state.current_index = (original + 1) % n;
    }

    /// Run `op` against the current endpoint's provider with retry/rotation
    /// on connection errors and exponential backoff on rate limiting,
    /// bounded by `max_retries_per_endpoint * endpoint_count` total attempts.
    pub async fn execute_with_retry<T, F, Fut>(&self, op_name: &str, op: F) -> Result<T, CoreError>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let total_attempts = self.max_retries_per_endpoint as usize * self.providers.len().max(1);

        for attempt in 0..total_attempts {
            let provider = self.current();
            let started = Instant::now();

            match op(provider).await {
                Ok(value) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let mut state = self.state.lock();
                    let idx = state.current_index;
                    state.health[idx].record_success(latency_ms);
                    return Ok(value);
                }
                Err(CoreError::RateLimited) => {
                    let delay_ms = (BASE_BACKOFF_MS * 2u64.saturating_pow(attempt as u32)).min(MAX_BACKOFF_MS);
                    warn!(op_name, delay_ms, "rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(CoreError::Network(msg)) => {
                    {
                        let mut state = self.state.lock();
                        let idx = state.current_index;
                        state.health[idx].record_failure();
                    }
                    warn!(op_name, error = %msg, endpoint = %self.current_label(), "endpoint failed, rotating");
                    self.rotate_to_next_healthy();
                }
                Err(other) => return Err(other),
            }
        }

        Err(CoreError::AllRpcsFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_rotation() {
        let pool = RpcPool::new(vec![("a".to_string(), 1u32), ("b".to_string(), 2u32)], 3);
        let result = pool.execute_with_retry("noop", |p| async move { Ok::<u32, CoreError>(p) }).await.unwrap();
        assert_eq!(result, 1);
    }

    #[tokio::test]
    async fn rotates_past_a_failing_endpoint() {
        let pool = RpcPool::new(vec![("a".to_string(), 1u32), ("b".to_string(), 2u32)], 3);
        let result = pool
            .execute_with_retry("noop", |p| async move {
                if p == 1 {
                    Err(CoreError::Network("down".into()))
                } else {
                    Ok(p)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn all_endpoints_failing_returns_all_rpcs_failed() {
        let pool = RpcPool::new(vec![("a".to_string(), 1u32)], 2);
        let result: Result<u32, CoreError> = pool.execute_with_retry("noop", |_p| async move { Err(CoreError::Network("down".into())) }).await;
        assert!(matches!(result, Err(CoreError::AllRpcsFailed)));
    }

    #[tokio::test]
    async fn non_retryable_error_propagates_immediately() {
        let pool = RpcPool::new(vec![("a".to_string(), 1u32)], 5);
        let attempts = AtomicU32::new(0);
        let result: Result<u32, CoreError> = pool
            .execute_with_retry("noop", |_p| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err(CoreError::InsufficientBalance) }
            })
            .await;
        assert!(matches!(result, Err(CoreError::InsufficientBalance)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
