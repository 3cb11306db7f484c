//! Atomic concentrated-liquidity arbitrage core for Base L2.
//!
//! Module map: `config` loads the environment-variable surface, `contracts`
//! holds every `sol!` interface, `registry` derives and verifies candidate
//! pools, `state` keeps the live pool snapshot table fresh, `engine` finds
//! and sizes candidate opportunities against that snapshot, `safety`
//! re-verifies them against the real on-chain quoter and OP-Stack cost
//! model, `executor` signs and broadcasts approved attempts, `journal`
//! records every attempt, `rpc` fails over across configured endpoints, and
//! `logging` wires up `tracing`.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

pub mod config;
pub mod contracts;
pub mod engine;
pub mod error;
pub mod executor;
pub mod journal;
pub mod logging;
pub mod registry;
pub mod rpc;
pub mod safety;
pub mod state;
pub mod types;

pub use config::{load_config, Config};
pub use error::CoreError;
