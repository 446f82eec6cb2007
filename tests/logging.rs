//! Logging setup
//!
//! The global subscriber can be installed once per process, so this binary
//! holds a single test.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use rpc_channel::config::LoggingConfig;
use rpc_channel::error::ChannelError;
use rpc_channel::utils::logging;
use tracing::Level;

#[test]
fn test_logging_setup() {
    let plain = LoggingConfig {
        log_level: Level::DEBUG,
        json_format: false,
        ..LoggingConfig::default()
    };
    let json = LoggingConfig {
        json_format: true,
        ..plain.clone()
    };

    for config in [&plain, &json] {
        tracing::subscriber::with_default(logging::subscriber(config), || {
            assert!(tracing::enabled!(Level::DEBUG));
            assert!(!tracing::enabled!(Level::TRACE));
            tracing::debug!(json = config.json_format, "scoped subscriber active");
        });
    }

    logging::init(&json).expect("first init installs the subscriber");
    assert!(matches!(
        logging::init(&plain),
        Err(ChannelError::ConfigError(_))
    ));
    tracing::info!("global subscriber active");
}
