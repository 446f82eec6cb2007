//! Timeout constants and an async timeout wrapper.

use std::future::Future;
use std::time::Duration;

use crate::error::{ChannelError, Result};

/// Default timeout for establishing a connection
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a TLS handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time to wait for the reply to a call
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `fut` for at most `duration`, mapping expiry to [`ChannelError::Timeout`]
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| ChannelError::Timeout)?
}
