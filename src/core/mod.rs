//! # Core Components
//!
//! Message envelope, wire codecs and the tokio codec adapter.
//!
//! ## Components
//! - **Message**: name, type, sequence id and opaque payload of one RPC message
//! - **Serialization**: the four [`serialization::Protocol`] codecs
//! - **Codec**: `tokio_util` Decoder/Encoder bridge over any codec

pub mod codec;
pub mod message;
pub mod serialization;
