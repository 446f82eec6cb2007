//! Protocol registry: the strategy table from [`Protocol`] to codec factory.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::serialization::{
    BinaryCodec, CompactCodec, JsonCodec, MessageCodec, Protocol, SimpleJsonCodec,
};
use crate::error::{ChannelError, Result};

/// Produces fresh codec instances for one protocol
pub trait CodecFactory: Send + Sync {
    fn protocol(&self) -> Protocol;

    fn codec(&self) -> Box<dyn MessageCodec>;
}

/// Factory for any stateless codec with a `Default` constructor
pub struct DefaultCodecFactory<C> {
    protocol: Protocol,
    _codec: std::marker::PhantomData<fn() -> C>,
}

impl<C> DefaultCodecFactory<C> {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            _codec: std::marker::PhantomData,
        }
    }
}

impl<C> CodecFactory for DefaultCodecFactory<C>
where
    C: MessageCodec + Default + 'static,
{
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn codec(&self) -> Box<dyn MessageCodec> {
        Box::new(C::default())
    }
}

/// Maps each protocol to its codec factory
pub struct ProtocolRegistry {
    factories: HashMap<Protocol, Arc<dyn CodecFactory>>,
}

static PROTOCOLS: Lazy<ProtocolRegistry> = Lazy::new(ProtocolRegistry::standard);

impl ProtocolRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with one factory per [`Protocol`] value
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(DefaultCodecFactory::<BinaryCodec>::new(
            Protocol::Binary,
        )));
        registry.register(Arc::new(DefaultCodecFactory::<JsonCodec>::new(
            Protocol::Json,
        )));
        registry.register(Arc::new(DefaultCodecFactory::<SimpleJsonCodec>::new(
            Protocol::SimpleJson,
        )));
        registry.register(Arc::new(DefaultCodecFactory::<CompactCodec>::new(
            Protocol::Compact,
        )));
        registry
    }

    /// Process-wide registry, built on first access
    pub fn global() -> &'static ProtocolRegistry {
        &PROTOCOLS
    }

    /// Register `factory` under the protocol it reports
    pub fn register(&mut self, factory: Arc<dyn CodecFactory>) {
        self.factories.insert(factory.protocol(), factory);
    }

    pub fn lookup(&self, protocol: Protocol) -> Result<Arc<dyn CodecFactory>> {
        self.factories
            .get(&protocol)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownProtocol(protocol.to_string()))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Look up a codec factory in the process-wide registry
pub fn codec_factory(protocol: Protocol) -> Result<Arc<dyn CodecFactory>> {
    ProtocolRegistry::global().lookup(protocol)
}
