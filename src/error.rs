//! # Error Types
//!
//! Error handling for channel assembly and RPC traffic.
//!
//! This module defines every error variant that can occur while building a
//! client or server, while moving messages through a transport chain, and
//! while dispatching calls.
//!
//! ## Error Categories
//! - **Configuration Errors**: unknown protocol selectors, invalid settings
//! - **Build Errors**: client/server assembly failures wrapping their cause
//! - **Transport Errors**: socket, TLS and framing failures
//! - **Codec Errors**: malformed or oversized messages
//! - **Application Errors**: exceptions raised by a remote processor
//!
//! Build failures are always returned to the caller; serve-loop failures are
//! only delivered through the server's failure channel.
//!
//! ## Example Usage
//! ```rust
//! use rpc_channel::core::serialization::Protocol;
//! use rpc_channel::error::{ChannelError, Result};
//!
//! fn parse(name: &str) -> Result<Protocol> {
//!     name.parse::<Protocol>()
//! }
//!
//! assert!(matches!(parse("thrift"), Err(ChannelError::UnknownProtocol(_))));
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants shared by the codecs and transports.
pub mod constants {
    pub const ERR_FRAME_TOO_LARGE: &str = "Frame exceeds maximum size";
    pub const ERR_FRAME_TRUNCATED: &str = "Connection closed inside a frame";
    pub const ERR_DISPATCHER_LOCK: &str = "Dispatcher lock poisoned";
}

/// ChannelError is the primary error type for every operation in this crate
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Failed to build client: {0}")]
    ClientBuild(#[source] Box<ChannelError>),

    #[error("Failed to build server: {0}")]
    ServerBuild(#[source] Box<ChannelError>),

    #[error("Failed to connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Deserialize error: {0}")]
    Deserialize(String),

    #[error("Invalid message header")]
    InvalidHeader,

    #[error("Message too large: {0} bytes")]
    OversizedMessage(usize),

    #[error("Application error: {0}")]
    Application(#[from] ApplicationError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChannelError {
    /// Wrap a composition-time failure as a client build error
    pub fn client_build(cause: ChannelError) -> Self {
        ChannelError::ClientBuild(Box::new(cause))
    }

    /// Wrap a composition-time failure as a server build error
    pub fn server_build(cause: ChannelError) -> Self {
        ChannelError::ServerBuild(Box::new(cause))
    }
}

/// Kinds of exception a processor can raise back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationErrorKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
}

/// Exception carried in an `Exception` reply
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ApplicationError {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationError {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ApplicationErrorKind::UnknownMethod,
            format!("Unknown method {method}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApplicationErrorKind::InternalError, message)
    }
}

/// Type alias for Results using ChannelError
pub type Result<T> = std::result::Result<T, ChannelError>;
