//! Tracing-subscriber initialization.
//!
//! `DEBUG_MODE=true` (see `config::Config`) switches the default level from
//! `info` to `debug`; `RUST_LOG` always takes precedence when set, matching
//! `EnvFilter`'s normal precedence rules.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use tracing_subscriber::EnvFilter;

pub fn init(debug_mode: bool) {
    let default_level = if debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
