//! # rpc-channel
//!
//! Assembles RPC clients and servers from three independently selectable
//! building blocks:
//!
//! - a wire codec ([`Protocol`]: BINARY, JSON, SIMPLEJSON, COMPACT),
//! - a stream wrapping strategy (8 KiB buffering, optional length-prefixed framing),
//! - a transport endpoint (plain TCP or TLS).
//!
//! ## Chain Order
//! ```text
//! socket -> buffering | identity -> framing? -> codec
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use rpc_channel::{build_client, build_server, ChannelError, Configuration, Dispatcher};
//!
//! # async fn run() -> rpc_channel::error::Result<()> {
//! let config = Configuration::default();
//! let dispatcher = Dispatcher::new();
//! dispatcher.register("echo", |args| Ok(args.to_vec()))?;
//!
//! let server = build_server("127.0.0.1:0", config, dispatcher).await?;
//! let mut bound = server.bound_address();
//! let closer = server.closer();
//! let mut failures = server.start();
//! let Some(local_addr) = bound.wait().await else {
//!     return Err(failures.recv().await.unwrap_or(ChannelError::ConnectionClosed));
//! };
//! let address = local_addr.to_string();
//!
//! let (mut client, transport) = build_client(&address, config).await?;
//! let reply = client.call("echo", b"hello".to_vec()).await?;
//! assert_eq!(reply, b"hello");
//! transport.close().await?;
//!
//! closer.close();
//! assert!(failures.recv().await.is_none());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{Configuration, NetworkConfig, TransportConfig};
pub use crate::core::message::{Message, MessageType};
pub use crate::core::serialization::Protocol;
pub use crate::error::{ApplicationError, ChannelError, Result};
pub use crate::protocol::dispatcher::Dispatcher;
pub use crate::protocol::processor::Processor;
pub use crate::service::client::{build_client, build_client_with, Client, ClientTransport};
pub use crate::service::server::{
    build_server, build_server_with, BoundAddress, FailureChannel, ListenerCloser, ServerHandle,
};
pub use crate::transport::tls::ClientTrust;
