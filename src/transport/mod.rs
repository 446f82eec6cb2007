//! # Transport Layer
//!
//! Byte-stream transports and the wrappers composed on top of them.
//!
//! Every assembled connection is a single chain, innermost first:
//!
//! ```text
//! [TCP or TLS socket] -> [buffering | identity] -> [framing]? -> codec
//! ```
//!
//! ## Components
//! - **Socket**: plain/TLS connect and the listening socket
//! - **Chain**: transport-wrapping factories and their registry
//! - **Framed**: length-prefixed framing wrapper
//! - **TLS**: certificate provisioning and client trust

use tokio::io::{AsyncRead, AsyncWrite};

pub mod chain;
pub mod framed;
pub mod socket;
pub mod tls;

/// A bidirectional byte stream usable as a link in a transport chain
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Type-erased transport, the unit passed between chain links
pub type BoxTransport = Box<dyn Transport>;
