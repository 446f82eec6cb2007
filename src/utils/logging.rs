//! Structured logging setup on top of `tracing-subscriber`.

use tracing::{info, Subscriber};

use crate::config::LoggingConfig;
use crate::error::{ChannelError, Result};

/// Build a fmt subscriber, plain or JSON, for the configured level.
///
/// Useful with `tracing::subscriber::with_default` where a global
/// subscriber is not wanted.
pub fn subscriber(config: &LoggingConfig) -> Box<dyn Subscriber + Send + Sync> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(true);

    if config.json_format {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.finish())
    }
}

/// Install [`subscriber`] as the global default.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber(config))
        .map_err(|e| ChannelError::ConfigError(format!("Failed to init logging: {e}")))?;

    info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
