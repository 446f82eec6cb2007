use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::core::message::Message;
use crate::core::serialization::{MessageCodec, Protocol};
use crate::error::ChannelError;

/// Tokio codec adapter around a boxed [`MessageCodec`]
pub struct ProtocolCodec {
    inner: Box<dyn MessageCodec>,
}

impl ProtocolCodec {
    pub fn new(inner: Box<dyn MessageCodec>) -> Self {
        Self { inner }
    }

    pub fn protocol(&self) -> Protocol {
        self.inner.protocol()
    }
}

impl Decoder for ProtocolCodec {
    type Item = Message;
    type Error = ChannelError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.inner.decode(src)
    }
}

impl Encoder<Message> for ProtocolCodec {
    type Error = ChannelError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(&item, dst)
    }
}
