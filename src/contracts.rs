//! Centralized Contract Definitions
//!
//! All Solidity contract interfaces touched by the core, defined with
//! alloy's `sol!` macro. Each interface is annotated with `#[sol(rpc)]`
//! so it can make RPC calls through any alloy Provider.
//!
//! Author: AI-Generated
//! Created: 2026-02-02

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
    }
}

// ── Uniswap V3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
    }
}

sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
    }
}

// ── Multicall3 ("aggregator contract" in spec.md §6) ──────────────────

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

/// Canonical Multicall3 deployment address — identical on every EVM chain,
/// including Base.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

// ── OP-Stack L1 gas oracle predeploy ──────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IGasPriceOracle {
        function l1BaseFee() external view returns (uint256);
        function overhead() external view returns (uint256);
        function scalar() external view returns (uint256);
        function getL1Fee(bytes memory data) external view returns (uint256);
    }
}

/// Canonical OP-Stack GasPriceOracle predeploy address (same on every
/// OP-Stack chain, including Base).
pub const GAS_PRICE_ORACLE_ADDRESS: &str = "0x420000000000000000000000000000000000000F";

// ── Counterparty flash-arbitrage contract (out-of-scope Solidity) ────

sol! {
    #[sol(rpc)]
    interface IFlashArbExecutor {
        function startArbitrage(address pool, address tokenBorrow, uint256 amount, bytes calldata swapData) external;
    }
}
