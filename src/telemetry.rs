//! Tracing subscriber installation.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::RelayError;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` is the filter directive.
/// Development mode logs with the human-readable pretty formatter, every
/// other run logs one JSON object per line.
///
/// # Errors
///
/// Returns [`RelayError::Config`] if `log_level` is not a valid filter
/// directive or a global subscriber is already installed.
pub fn init(dev_mode: bool, log_level: &str) -> Result<(), RelayError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .map_err(|e| RelayError::Config(format!("invalid LOG_LEVEL {log_level:?}: {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if dev_mode {
        registry.with(fmt::layer().pretty()).try_init()
    } else {
        registry.with(fmt::layer().json()).try_init()
    };
    installed.map_err(|e| RelayError::Config(format!("failed to install tracing subscriber: {e}")))
}
