//! # Configuration Management
//!
//! Channel selection and transport settings for clients and servers.
//!
//! [`Configuration`] picks the building blocks of a channel (protocol,
//! TLS, buffering, framing). [`TransportConfig`] holds the knobs those
//! blocks need: timeouts, frame limits and client trust. [`NetworkConfig`]
//! bundles both with an address and logging settings for loading from a
//! file or the environment.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Defaults
//! - Protocol BINARY, plain socket, buffered, unframed
//! - 8 KiB buffering, 16 MiB frame and message limits

use crate::core::serialization::Protocol;
use crate::error::{ChannelError, Result};
use crate::transport::tls::ClientTrust;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Internal buffer size of the buffering wrapper (8 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Max allowed encoded message size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default max frame size for the framing wrapper (16 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Which building blocks make up a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    /// Serialization codec
    pub protocol: Protocol,
    /// Plain socket (false) or TLS socket (true)
    pub secure: bool,
    /// Wrap the socket in an 8 KiB buffer
    pub buffered: bool,
    /// Add length-prefixed framing on top of buffering
    pub framed: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            protocol: Protocol::Binary,
            secure: false,
            buffered: true,
            framed: false,
        }
    }
}

impl Configuration {
    pub fn new(protocol: Protocol, secure: bool, buffered: bool, framed: bool) -> Self {
        Self {
            protocol,
            secure,
            buffered,
            framed,
        }
    }
}

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Address to connect to or listen on (e.g., "127.0.0.1:9090")
    pub address: String,

    /// Channel building blocks
    #[serde(default)]
    pub channel: Configuration,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9090"),
            channel: Configuration::default(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("RPC_CHANNEL_ADDRESS") {
            config.address = addr;
        }

        if let Ok(protocol) = std::env::var("RPC_CHANNEL_PROTOCOL") {
            config.channel.protocol = protocol.parse()?;
        }

        for (name, flag) in [
            ("RPC_CHANNEL_SECURE", &mut config.channel.secure),
            ("RPC_CHANNEL_BUFFERED", &mut config.channel.buffered),
            ("RPC_CHANNEL_FRAMED", &mut config.channel.framed),
        ] {
            if let Ok(value) = std::env::var(name) {
                *flag = parse_flag(name, &value)?;
            }
        }

        if let Ok(timeout) = std::env::var("RPC_CHANNEL_CONNECT_TIMEOUT_MS") {
            let millis = timeout.trim().parse::<u64>().map_err(|e| {
                ChannelError::ConfigError(format!(
                    "Invalid RPC_CHANNEL_CONNECT_TIMEOUT_MS '{timeout}': {e}"
                ))
            })?;
            config.transport.connect_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Address cannot be empty".to_string());
        } else if !self.address.contains(':') {
            errors.push(format!(
                "Invalid address format: '{}' (expected format: 'host:port')",
                self.address
            ));
        }

        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChannelError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ChannelError::ConfigError(format!(
            "Invalid boolean for {name}: '{value}'"
        ))),
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Timeout for establishing the TCP connection
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout for the TLS handshake on either side
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Timeout for waiting for a reply to a call
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Largest frame accepted or produced by the framing wrapper
    pub max_frame_size: usize,

    /// How a secure client checks the server certificate
    pub trust: ClientTrust,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: timeout::DEFAULT_TIMEOUT,
            handshake_timeout: timeout::HANDSHAKE_TIMEOUT,
            response_timeout: timeout::RESPONSE_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            trust: ClientTrust::default(),
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.connect_timeout.as_millis() < 10 {
            errors.push("Connect timeout too short (minimum: 10ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.handshake_timeout.as_millis() < 10 {
            errors.push("Handshake timeout too short (minimum: 10ms)".to_string());
        }

        if self.response_timeout.as_millis() < 10 {
            errors.push("Response timeout too short (minimum: 10ms)".to_string());
        }

        if self.max_frame_size == 0 {
            errors.push("Max frame size cannot be 0".to_string());
        } else if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_frame_size
            ));
        }

        if let ClientTrust::CaPem(pem) = &self.trust {
            if !pem.contains("BEGIN CERTIFICATE") {
                errors.push("Trusted CA is not a PEM certificate".to_string());
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("rpc-channel"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
