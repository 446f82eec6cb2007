//! # Service Layer
//!
//! Client and server assembly on top of the transport and protocol layers.
//!
//! ## Components
//! - **Client**: `build_client` returns a call handle plus its closeable transport
//! - **Server**: `build_server` returns a handle whose `start` runs the accept loop
//! - **Channel**: inbound/outbound codec pair over one transport chain

pub mod channel;
pub mod client;
pub mod server;
