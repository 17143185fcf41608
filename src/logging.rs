//! Tracing setup
//!
//! `RUST_LOG` takes precedence over the configured level, so
//! `RUST_LOG=hgm_daq=debug` shows every frame sent and received.

use crate::config::{ApplicationConfig, LogFormat};
use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by the application config.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &ApplicationConfig) -> Result<()> {
    let filter = filter_for(config)?;

    let installed = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

fn filter_for(config: &ApplicationConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log level '{}'", config.log_level)),
    }
}
