//! Core error taxonomy
//!
//! Models every failure kind in the error-handling design as a value, not
//! an ad hoc string. `SimOutcome` replaces exceptions-as-flow-control for
//! pre-flight simulation results (see Design Notes in SPEC_FULL.md §9).
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transient network error: {0}")]
    Network(String),

    #[error("all configured RPC endpoints failed")]
    AllRpcsFailed,

    #[error("rate limited by RPC provider")]
    RateLimited,

    #[error("contract call reverted: {0}")]
    Reverted(String),

    #[error("quoter reverted")]
    QuoterReverted,

    #[error("aggregate3 batch call failed: {0}")]
    AggregateCallFailed(String),

    #[error("insufficient on-chain balance for flash-fee buffer")]
    InsufficientBalance,

    #[error("nonce too low")]
    NonceTooLow,

    #[error("replacement transaction underpriced")]
    ReplacementUnderpriced,

    #[error("missing required configuration: {0}")]
    MissingConfig(String),

    #[error("invalid configuration value for {0}: {1}")]
    InvalidConfig(String, String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("abi encode/decode error: {0}")]
    Abi(String),

    #[error("other: {0}")]
    Other(String),
}

impl CoreError {
    /// Whether this error should trigger a nonce-cache invalidation per §4.5.2.
    pub fn invalidates_nonce(&self) -> bool {
        matches!(
            self,
            CoreError::Reverted(_)
                | CoreError::NonceTooLow
                | CoreError::ReplacementUnderpriced
                | CoreError::Network(_)
                | CoreError::AllRpcsFailed
        )
    }
}

/// Classification of a revert message surfaced during pre-flight simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertClass {
    NoProfit,
    Insufficient,
    Other(String),
}

impl RevertClass {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("noprofit") || lower.contains("no profit") || lower.contains("unprofitable") {
            RevertClass::NoProfit
        } else if lower.contains("insufficient") {
            RevertClass::Insufficient
        } else {
            RevertClass::Other(message.to_string())
        }
    }
}

/// Outcome of a pre-flight simulation (`eth_call` against the counterparty
/// contract). Replaces broad exception handling with a sum type per the
/// Design Notes in SPEC_FULL.md §9.
#[derive(Debug, Clone)]
pub enum SimOutcome {
    Ok,
    RevertNoProfit,
    RevertInsufficient,
    RevertOther(String),
    CallError(String),
}

impl SimOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SimOutcome::Ok)
    }

    pub fn from_revert(message: &str) -> Self {
        match RevertClass::classify(message) {
            RevertClass::NoProfit => SimOutcome::RevertNoProfit,
            RevertClass::Insufficient => SimOutcome::RevertInsufficient,
            RevertClass::Other(m) => SimOutcome::RevertOther(m),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_no_profit_revert() {
        assert_eq!(RevertClass::classify("execution reverted: NoProfit"), RevertClass::NoProfit);
    }

    #[test]
    fn classifies_insufficient_revert() {
        assert_eq!(
            RevertClass::classify("execution reverted: insufficient output amount"),
            RevertClass::Insufficient
        );
    }

    #[test]
    fn classifies_other_revert() {
        assert_eq!(
            RevertClass::classify("execution reverted: custom error 0x1234"),
            RevertClass::Other("execution reverted: custom error 0x1234".to_string())
        );
    }

    #[test]
    fn nonce_invalidation_policy() {
        assert!(CoreError::NonceTooLow.invalidates_nonce());
        assert!(CoreError::Reverted("x".into()).invalidates_nonce());
        assert!(!CoreError::InsufficientBalance.invalidates_nonce());
    }
}
