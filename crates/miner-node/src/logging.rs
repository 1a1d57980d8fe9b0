//! Logging setup.
//!
//! The binary calls [`init`] once at startup; the rest of the crate logs
//! through the `tracing` macros.

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
};

/// Log to stdout, filtered by `RUST_LOG` with a default level of INFO.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
