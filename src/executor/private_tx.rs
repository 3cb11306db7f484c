//! PrivateTransactionManager — rotation across private-builder endpoints.
//!
//! A value type owned by the Executor with no back-reference (the source
//! codebase's cyclical Executor/PrivateTransactionManager ownership is
//! deliberately not reproduced here). Tries endpoints in rotation order and
//! reports total failure so the Executor can fall back to the public
//! mempool path it also exposes.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use alloy::primitives::Bytes;
use alloy::rpc::client::ClientBuilder;
use parking_lot::Mutex;
use serde_json::json;
use tracing::warn;

use crate::error::CoreError;

pub struct PrivateTransactionManager {
    endpoints: Vec<String>,
    rotation_index: Mutex<usize>,
    bundle_simulation_rpc: Option<String>,
}

impl PrivateTransactionManager {
    pub fn new(endpoints: Vec<String>, bundle_simulation_rpc: Option<String>) -> Self {
        Self {
            endpoints,
            rotation_index: Mutex::new(0),
            bundle_simulation_rpc,
        }
    }

    pub fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub fn has_bundle_simulation(&self) -> bool {
        self.bundle_simulation_rpc.is_some()
    }

    /// Optionally simulate via `eth_callBundle` against the configured
    /// simulator endpoint. Proceeds only if the simulated coinbase diff is
    /// positive and no transaction in the bundle reverts.
    pub async fn simulate_bundle(&self, raw_tx: &Bytes) -> Result<bool, CoreError> {
        let Some(endpoint) = &self.bundle_simulation_rpc else {
            return Ok(true);
        };

        let client = ClientBuilder::default()
            .http(endpoint.parse().map_err(|_| CoreError::Other(format!("invalid bundle simulation url: {endpoint}")))?);

        let params = json!([{ "txs": [format!("0x{}", hex::encode(raw_tx))] }]);
        let response: serde_json::Value = client
            .request("eth_callBundle", params)
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?;

        let coinbase_diff = response
            .get("coinbaseDiff")
            .and_then(|v| v.as_str())
            .and_then(|s| s.trim_start_matches("0x").parse::<u128>().ok())
            .unwrap_or(0);
        let any_reverted = response
            .get("results")
            .and_then(|v| v.as_array())
            .map(|results| results.iter().any(|r| r.get("error").is_some()))
            .unwrap_or(false);

        Ok(coinbase_diff > 0 && !any_reverted)
    }

    /// Try every configured private endpoint in rotation order, advancing
    /// the shared rotation index on each call so load is spread across
    /// endpoints between attempts. Returns the responding endpoint's tx
    /// hash, or an error once every endpoint has failed.
    pub async fn submit(&self, raw_tx: &Bytes) -> Result<String, CoreError> {
        if self.endpoints.is_empty() {
            return Err(CoreError::AllRpcsFailed);
        }

        let start = {
            let mut idx = self.rotation_index.lock();
            let current = *idx;
            *idx = (*idx + 1) % self.endpoints.len();
            current
        };

        for offset in 0..self.endpoints.len() {
            let endpoint_index = (start + offset) % self.endpoints.len();
            let endpoint = &self.endpoints[endpoint_index];
            match self.send_private(endpoint, raw_tx).await {
                Ok(hash) => return Ok(hash),
                Err(err) => {
                    warn!(endpoint, error = %err, "private endpoint failed, rotating");
                    continue;
                }
            }
        }

        Err(CoreError::AllRpcsFailed)
    }

    /// Submits via `eth_sendPrivateTransaction` (Flashbots-style) against a
    /// single builder endpoint, per §4.5.5. `maxBlockNumber` is omitted when
    /// the caller has no recent block number to offer; the endpoint then
    /// applies its own default inclusion window.
    async fn send_private(&self, endpoint: &str, raw_tx: &Bytes) -> Result<String, CoreError> {
        let client = ClientBuilder::default()
            .http(endpoint.parse().map_err(|_| CoreError::Other(format!("invalid private rpc url: {endpoint}")))?);

        let params = json!([{
            "tx": format!("0x{}", hex::encode(raw_tx)),
        }]);

        let hash: String = client
            .request("eth_sendPrivateTransaction", params)
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_advances_index() {
        let manager = PrivateTransactionManager::new(
            vec!["https://a".into(), "https://b".into()],
            None,
        );
        assert!(manager.has_endpoints());
        assert!(!manager.has_bundle_simulation());
    }

    #[test]
    fn no_endpoints_reports_total_failure_immediately() {
        let manager = PrivateTransactionManager::new(vec![], None);
        assert!(!manager.has_endpoints());
    }

    #[tokio::test]
    async fn submit_with_no_endpoints_fails_fast() {
        let manager = PrivateTransactionManager::new(vec![], None);
        let raw_tx = Bytes::from(vec![0u8; 4]);
        let result = manager.submit(&raw_tx).await;
        assert!(matches!(result, Err(CoreError::AllRpcsFailed)));
    }

    #[tokio::test]
    async fn bundle_simulation_passes_through_when_unconfigured() {
        let manager = PrivateTransactionManager::new(vec![], None);
        let raw_tx = Bytes::from(vec![0u8; 4]);
        assert!(manager.simulate_bundle(&raw_tx).await.unwrap());
    }
}
