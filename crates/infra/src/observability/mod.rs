//! Tracing subscriber bootstrap
//!
//! `RUST_LOG` wins when set; otherwise the configured level is used as the
//! filter directive. Output is human-readable or JSON lines.

use dealflow_domain::{DealflowError, LoggingConfig, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter for `config`, preferring `RUST_LOG`.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|err| DealflowError::Config(format!("invalid log level '{}': {err}", config.level)))
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, so tests and
/// embedding applications can call this repeatedly.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    Ok(installed.is_ok())
}
