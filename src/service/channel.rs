use futures::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::trace;

use crate::core::codec::ProtocolCodec;
use crate::core::message::Message;
use crate::core::serialization::Protocol;
use crate::error::Result;
use crate::protocol::registry::CodecFactory;
use crate::transport::BoxTransport;

/// The codec end of a transport chain: one inbound and one outbound codec
/// instance over the two halves of the same transport.
pub struct Channel {
    input: FramedRead<ReadHalf<BoxTransport>, ProtocolCodec>,
    output: FramedWrite<WriteHalf<BoxTransport>, ProtocolCodec>,
}

impl Channel {
    pub fn new(transport: BoxTransport, codecs: &dyn CodecFactory) -> Self {
        let (reader, writer) = tokio::io::split(transport);
        Self {
            input: FramedRead::new(reader, ProtocolCodec::new(codecs.codec())),
            output: FramedWrite::new(writer, ProtocolCodec::new(codecs.codec())),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.output.encoder().protocol()
    }

    /// Encode and flush one message through the whole chain
    pub async fn send(&mut self, msg: Message) -> Result<()> {
        trace!(name = %msg.name, seq_id = msg.seq_id, kind = ?msg.kind, "Sending message");
        self.output.send(msg).await
    }

    /// Next inbound message, or `None` once the peer has closed the stream
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        self.input.next().await.transpose()
    }

    /// Flush pending output and shut down the write side
    pub async fn close(&mut self) -> Result<()> {
        SinkExt::<Message>::close(&mut self.output).await
    }
}
