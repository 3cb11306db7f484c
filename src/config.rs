//! Configuration loading
//!
//! Loads the full environment-variable surface from `.env` / the process
//! environment. Missing/invalid required values are a fatal startup error
//! (exit code 1) per the error-handling design; optional values fall back
//! to documented Base-mainnet defaults.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use std::str::FromStr;

use alloy::primitives::{Address, B256};

use crate::error::CoreError;

/// Base mainnet Uniswap V3 factory.
pub const DEFAULT_V3_FACTORY: &str = "0x33128a8fC17869897dcE68Ed026d694621f6FDfD";
/// Base mainnet SwapRouter02.
pub const DEFAULT_SWAP_ROUTER: &str = "0x2626664c2603336E57B271c5C0b26F421741e481";
/// Base mainnet QuoterV2.
pub const DEFAULT_QUOTER_V2: &str = "0x3d4e44Eb1374240CE5F1B871ab261CD16335B76a";
/// Canonical Multicall3 deployment, identical across EVM chains.
pub const DEFAULT_MULTICALL3: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";
/// Base mainnet canonical WETH.
pub const DEFAULT_WETH: &str = "0x4200000000000000000000000000000000000006";
/// Uniswap V3 pool init code hash (identical across Uniswap V3 deployments).
pub const DEFAULT_POOL_INIT_CODE_HASH: &str =
    "0xe34f199b19b2b4f47f68442619d555527d244f78a3297ea89325f843f87b9100";
/// OP-Stack GasPriceOracle predeploy, identical across every OP-Stack chain.
pub const DEFAULT_GAS_PRICE_ORACLE: &str = "0x420000000000000000000000000000000000000F";

fn required(key: &str) -> Result<String, CoreError> {
    std::env::var(key).map_err(|_| CoreError::MissingConfig(key.to_string()))
}

fn optional_with_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, CoreError> {
    raw.parse::<T>()
        .map_err(|_| CoreError::InvalidConfig(key.to_string(), raw.to_string()))
}

fn parse_address(key: &str, raw: &str) -> Result<Address, CoreError> {
    Address::from_str(raw).map_err(|_| CoreError::InvalidConfig(key.to_string(), raw.to_string()))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, CoreError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::InvalidConfig(key.to_string(), raw.to_string())),
    }
}

fn parse_hash(key: &str, raw: &str) -> Result<B256, CoreError> {
    B256::from_str(raw).map_err(|_| CoreError::InvalidConfig(key.to_string(), raw.to_string()))
}

fn env_bool_or(key: &str, default: bool) -> Result<bool, CoreError> {
    match std::env::var(key) {
        Ok(raw) => parse_bool(key, &raw),
        Err(_) => Ok(default),
    }
}

fn env_parse_or<T: FromStr>(key: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(key) {
        Ok(raw) => parse(key, &raw),
        Err(_) => Ok(default),
    }
}

/// Stuck-transaction replacement parameters (§4.5.6).
#[derive(Debug, Clone)]
pub struct ReplacementConfig {
    pub enabled: bool,
    pub initial_wait_secs: u64,
    pub speedup_interval_secs: u64,
    pub bump_pct: u64,
    pub max_gas_gwei: u64,
    pub max_speedup_attempts: u32,
    pub total_timeout_secs: u64,
}

/// Private-submission configuration (§4.5.5).
#[derive(Debug, Clone)]
pub struct PrivateTxConfig {
    pub enabled: bool,
    pub private_rpc_urls: Vec<String>,
    pub bundle_simulation_rpc: Option<String>,
}

/// Per-token cooldown / circuit-breaker configuration (§7).
#[derive(Debug, Clone)]
pub struct CooldownConfig {
    pub max_consecutive_failures: u32,
    pub failure_pause_secs: u64,
    pub max_tx_per_hour: u32,
    pub min_balance_eth: f64,
}

/// One entry of the persisted tokens list (§6 "a tokens list").
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// Parse the `TOKENS` env var: comma-separated `symbol:address:decimals`
/// triples, mirroring the teacher's `TRADING_PAIRS` colon-delimited format.
fn parse_tokens(raw: &str) -> Result<Vec<TokenConfig>, CoreError> {
    raw.split(',')
        .map(|entry| {
            let parts: Vec<&str> = entry.trim().split(':').collect();
            if parts.len() != 3 {
                return Err(CoreError::InvalidConfig("TOKENS".to_string(), entry.to_string()));
            }
            Ok(TokenConfig {
                symbol: parts[0].to_string(),
                address: parse_address("TOKENS", parts[1])?,
                decimals: parse("TOKENS", parts[2])?,
            })
        })
        .collect()
}

/// Fully-loaded runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Network / signer
    pub rpc_url: String,
    pub rpc_fallback_urls: Vec<String>,
    pub chain_id: u64,
    pub private_key: String,

    // Chain contracts
    pub flashbot_address: Address,
    pub v3_factory: Address,
    pub swap_router: Address,
    pub quoter_v2: Address,
    pub multicall3: Address,
    pub gas_price_oracle: Address,
    pub weth: Address,
    pub pool_init_code_hash: B256,
    pub fee_tiers: Vec<u32>,
    pub tokens: Vec<TokenConfig>,

    // Sizing
    pub min_profit_eth: f64,
    pub min_borrow_eth: f64,
    pub max_borrow_eth: f64,
    pub amount_precision_eth: f64,

    // Fees / gas caps
    pub max_gas_gwei: u64,
    pub gas_limit: u64,
    pub tx_timeout_secs: u64,

    // Sniper / fee construction
    pub sniper_mode_enabled: bool,
    pub sniper_mode_multiplier: f64,

    // Slippage
    pub slippage_tolerance_bps: u64,
    pub enforce_min_amount_out: bool,

    // Simulation
    pub strict_simulation_check: bool,

    pub replacement: ReplacementConfig,
    pub private_tx: PrivateTxConfig,

    // Loop / runtime
    pub scan_interval_ms: u64,
    pub dry_run: bool,
    pub debug_mode: bool,

    // Liquidity floor
    pub min_liquidity_wei: u128,
    pub min_liquidity_eth: f64,

    pub cooldown: CooldownConfig,
}

/// Load configuration from `.env` + process environment.
pub fn load_config() -> Result<Config, CoreError> {
    dotenv::dotenv().ok();

    let fee_tiers_raw = optional_with_default("FEE_TIERS", "100,500,3000,10000");
    let fee_tiers = fee_tiers_raw
        .split(',')
        .map(|s| parse::<u32>("FEE_TIERS", s.trim()))
        .collect::<Result<Vec<u32>, CoreError>>()?;

    let private_rpc_urls = std::env::var("PRIVATE_RPC_URL")
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let tokens = parse_tokens(&required("TOKENS")?)?;

    let rpc_fallback_urls = std::env::var("RPC_FALLBACK_URLS")
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    Ok(Config {
        rpc_url: required("RPC_URL")?,
        rpc_fallback_urls,
        chain_id: parse("CHAIN_ID", &required("CHAIN_ID")?)?,
        private_key: required("PRIVATE_KEY")?,

        flashbot_address: parse_address("FLASHBOT_ADDRESS", &required("FLASHBOT_ADDRESS")?)?,
        v3_factory: parse_address("V3_FACTORY", &optional_with_default("V3_FACTORY", DEFAULT_V3_FACTORY))?,
        swap_router: parse_address("SWAP_ROUTER", &optional_with_default("SWAP_ROUTER", DEFAULT_SWAP_ROUTER))?,
        quoter_v2: parse_address("QUOTER_V2", &optional_with_default("QUOTER_V2", DEFAULT_QUOTER_V2))?,
        multicall3: parse_address("MULTICALL3", &optional_with_default("MULTICALL3", DEFAULT_MULTICALL3))?,
        gas_price_oracle: parse_address("GAS_PRICE_ORACLE", &optional_with_default("GAS_PRICE_ORACLE", DEFAULT_GAS_PRICE_ORACLE))?,
        weth: parse_address("WETH", &optional_with_default("WETH", DEFAULT_WETH))?,
        pool_init_code_hash: parse_hash(
            "POOL_INIT_CODE_HASH",
            &optional_with_default("POOL_INIT_CODE_HASH", DEFAULT_POOL_INIT_CODE_HASH),
        )?,
        fee_tiers,
        tokens,

        min_profit_eth: env_parse_or("MIN_PROFIT_ETH", 0.0005)?,
        min_borrow_eth: env_parse_or("MIN_BORROW_ETH", 0.01)?,
        max_borrow_eth: env_parse_or("MAX_BORROW_ETH", 5.0)?,
        amount_precision_eth: env_parse_or("AMOUNT_PRECISION_ETH", 0.001)?,

        max_gas_gwei: env_parse_or("MAX_GAS_GWEI", 10)?,
        gas_limit: env_parse_or("GAS_LIMIT", 500_000)?,
        tx_timeout_secs: env_parse_or("TX_TIMEOUT", 120)?,

        sniper_mode_enabled: env_bool_or("SNIPER_MODE_ENABLED", true)?,
        sniper_mode_multiplier: env_parse_or("SNIPER_MODE_MULTIPLIER", 2.0)?,

        slippage_tolerance_bps: env_parse_or("SLIPPAGE_TOLERANCE_BPS", 50)?,
        enforce_min_amount_out: env_bool_or("ENFORCE_MIN_AMOUNT_OUT", true)?,

        strict_simulation_check: env_bool_or("STRICT_SIMULATION_CHECK", true)?,

        replacement: ReplacementConfig {
            enabled: env_bool_or("TX_SPEEDUP_ENABLED", true)?,
            initial_wait_secs: env_parse_or("TX_INITIAL_WAIT", 5)?,
            speedup_interval_secs: env_parse_or("TX_SPEEDUP_INTERVAL", 3)?,
            bump_pct: env_parse_or("TX_SPEEDUP_GAS_BUMP_PCT", 15)?,
            max_gas_gwei: env_parse_or("TX_MAX_GAS_GWEI", 50)?,
            max_speedup_attempts: env_parse_or("TX_MAX_SPEEDUP_ATTEMPTS", 5)?,
            total_timeout_secs: env_parse_or("TX_TOTAL_TIMEOUT", 120)?,
        },

        private_tx: PrivateTxConfig {
            enabled: env_bool_or("PRIVATE_TX_ENABLED", false)?,
            private_rpc_urls,
            bundle_simulation_rpc: std::env::var("BUNDLE_SIMULATION_RPC").ok(),
        },

        scan_interval_ms: env_parse_or("SCAN_INTERVAL", 1000)?,
        dry_run: env_bool_or("DRY_RUN", true)?,
        debug_mode: env_bool_or("DEBUG_MODE", false)?,

        min_liquidity_wei: env_parse_or("MIN_LIQUIDITY", 0)?,
        min_liquidity_eth: env_parse_or("MIN_LIQUIDITY_ETH", 0.1)?,

        cooldown: CooldownConfig {
            max_consecutive_failures: env_parse_or("MAX_CONSECUTIVE_FAILURES", 3)?,
            failure_pause_secs: env_parse_or("FAILURE_PAUSE_DURATION", 3600)?,
            max_tx_per_hour: env_parse_or("MAX_TX_PER_HOUR", 60)?,
            min_balance_eth: env_parse_or("MIN_BALANCE_ETH", 0.01)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bool_variants() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "false").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn rejects_bad_address() {
        assert!(parse_address("FLASHBOT_ADDRESS", "not-an-address").is_err());
    }

    #[test]
    fn default_v3_factory_parses() {
        assert!(parse_address("V3_FACTORY", DEFAULT_V3_FACTORY).is_ok());
    }

    #[test]
    fn default_pool_init_code_hash_parses() {
        assert!(parse_hash("POOL_INIT_CODE_HASH", DEFAULT_POOL_INIT_CODE_HASH).is_ok());
    }

    #[test]
    fn default_gas_price_oracle_parses() {
        assert!(parse_address("GAS_PRICE_ORACLE", DEFAULT_GAS_PRICE_ORACLE).is_ok());
    }

    #[test]
    fn parses_tokens_list() {
        let raw = "WETH:0x4200000000000000000000000000000000000006:18,USDC:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913:6";
        let tokens = parse_tokens(raw).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].symbol, "WETH");
        assert_eq!(tokens[0].decimals, 18);
        assert_eq!(tokens[1].symbol, "USDC");
        assert_eq!(tokens[1].decimals, 6);
    }

    #[test]
    fn rejects_malformed_token_entry() {
        assert!(parse_tokens("WETH:0x42").is_err());
    }

    #[test]
    fn empty_rpc_fallback_list_parses_to_empty_vec() {
        let parsed: Vec<String> = "".split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        assert!(parsed.is_empty());
    }
}
