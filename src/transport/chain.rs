//! # Transport Chain
//!
//! Factories that wrap a raw transport into the stream the codecs read and
//! write. Buffering and framing are layered independently:
//!
//! - the base factory is picked by `buffered` from a process-wide registry
//!   (8 KiB `BufStream` or identity);
//! - framing, when requested, decorates the base factory so frame boundaries
//!   are computed over the buffered stream, never the raw socket.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::BufStream;
use tracing::debug;

use crate::config::{TransportConfig, DEFAULT_BUFFER_SIZE};
use crate::error::{ChannelError, Result};
use crate::transport::framed::FramedTransport;
use crate::transport::BoxTransport;

/// Wraps one transport into another
pub trait TransportFactory: Send + Sync {
    /// Wrap `transport`, returning the outer link of the chain
    fn wrap(&self, transport: BoxTransport) -> Result<BoxTransport>;

    /// Layer order produced by this factory, innermost wrapper first
    fn describe(&self) -> String;
}

/// Passes the transport through untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransportFactory;

impl TransportFactory for IdentityTransportFactory {
    fn wrap(&self, transport: BoxTransport) -> Result<BoxTransport> {
        Ok(transport)
    }

    fn describe(&self) -> String {
        "identity".to_string()
    }
}

/// Batches reads and writes through fixed-size buffers
#[derive(Debug, Clone, Copy)]
pub struct BufferedTransportFactory {
    capacity: usize,
}

impl BufferedTransportFactory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl TransportFactory for BufferedTransportFactory {
    fn wrap(&self, transport: BoxTransport) -> Result<BoxTransport> {
        Ok(Box::new(BufStream::with_capacity(
            self.capacity,
            self.capacity,
            transport,
        )))
    }

    fn describe(&self) -> String {
        format!("buffered({})", self.capacity)
    }
}

/// Adds length-prefixed framing on top of another factory's output
pub struct FramedTransportFactory {
    inner: Arc<dyn TransportFactory>,
    config: TransportConfig,
}

impl FramedTransportFactory {
    pub fn new(inner: Arc<dyn TransportFactory>, config: TransportConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl TransportFactory for FramedTransportFactory {
    fn wrap(&self, transport: BoxTransport) -> Result<BoxTransport> {
        if self.config.max_frame_size == 0 {
            return Err(ChannelError::TransportError(
                "framing requires a non-zero max frame size".into(),
            ));
        }
        let inner = self.inner.wrap(transport)?;
        Ok(Box::new(FramedTransport::new(
            inner,
            self.config.max_frame_size,
        )))
    }

    fn describe(&self) -> String {
        format!("framed({})", self.inner.describe())
    }
}

/// Base wrapping factories keyed by the `buffered` flag
pub struct TransportRegistry {
    factories: HashMap<bool, Arc<dyn TransportFactory>>,
}

static TRANSPORTS: Lazy<TransportRegistry> = Lazy::new(TransportRegistry::standard);

impl TransportRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with 8 KiB buffering for `true` and identity for `false`
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(
            true,
            Arc::new(BufferedTransportFactory::new(DEFAULT_BUFFER_SIZE)),
        );
        registry.register(false, Arc::new(IdentityTransportFactory));
        registry
    }

    /// Process-wide registry, built on first access
    pub fn global() -> &'static TransportRegistry {
        &TRANSPORTS
    }

    pub fn register(&mut self, buffered: bool, factory: Arc<dyn TransportFactory>) {
        self.factories.insert(buffered, factory);
    }

    pub fn lookup(&self, buffered: bool) -> Result<Arc<dyn TransportFactory>> {
        self.factories.get(&buffered).cloned().ok_or_else(|| {
            ChannelError::TransportError(format!("no transport factory for buffered={buffered}"))
        })
    }

    /// Compose the base factory for `buffered` with optional framing
    pub fn chain(
        &self,
        buffered: bool,
        framed: bool,
        config: &TransportConfig,
    ) -> Result<Arc<dyn TransportFactory>> {
        let base = self.lookup(buffered)?;
        let factory: Arc<dyn TransportFactory> = if framed {
            Arc::new(FramedTransportFactory::new(base, config.clone()))
        } else {
            base
        };
        debug!(chain = %factory.describe(), "Transport chain composed");
        Ok(factory)
    }
}

/// Compose a transport chain from the process-wide registry
pub fn transport_chain(
    buffered: bool,
    framed: bool,
    config: &TransportConfig,
) -> Result<Arc<dyn TransportFactory>> {
    TransportRegistry::global().chain(buffered, framed, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_descriptions() {
        let config = TransportConfig::default();
        let cases = [
            (false, false, "identity"),
            (true, false, "buffered(8192)"),
            (false, true, "framed(identity)"),
            (true, true, "framed(buffered(8192))"),
        ];
        for (buffered, framed, expected) in cases {
            let chain = transport_chain(buffered, framed, &config).unwrap();
            assert_eq!(chain.describe(), expected);
        }
    }

    #[test]
    fn test_empty_registry_lookup_fails() {
        let registry = TransportRegistry::empty();
        assert!(matches!(
            registry.lookup(true),
            Err(ChannelError::TransportError(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_frame_size_fails_to_wrap() {
        let config = TransportConfig {
            max_frame_size: 0,
            ..TransportConfig::default()
        };
        let chain = transport_chain(true, true, &config).unwrap();
        let (io, _peer) = tokio::io::duplex(64);
        assert!(matches!(
            chain.wrap(Box::new(io)),
            Err(ChannelError::TransportError(_))
        ));
    }
}
