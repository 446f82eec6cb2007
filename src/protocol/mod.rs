//! # Protocol Layer
//!
//! Codec selection and call dispatch.
//!
//! ## Components
//! - **Registry**: [`Protocol`](crate::core::serialization::Protocol) to codec factory table
//! - **Processor**: per-call handler contract used by the serve loop
//! - **Dispatcher**: processor routing calls to handlers by method name

pub mod dispatcher;
pub mod processor;
pub mod registry;
