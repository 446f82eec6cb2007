//! # Utility Modules
//!
//! Supporting utilities for logging and timing.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Timeout defaults and async timeout wrapper

pub mod logging;
pub mod timeout;
