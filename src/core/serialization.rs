//! # Serialization Protocols
//!
//! Wire codecs that turn [`Message`] values into bytes and back.
//! Four protocols are supported, each selectable through [`Protocol`]:
//!
//! ## Envelopes
//! ```text
//! Binary:     [0x80 0x01] [Length u32 BE] [bincode body]
//! Compact:    [0x82] [Length ULEB128] [MessagePack body]
//! Json:       [1,"name",kind,seq,[payload]]\n
//! SimpleJson: {"name":..,"type":..,"seqid":..,"payload":[..]}\n
//! ```
//!
//! Decoders are incremental: they return `Ok(None)` until a whole message is
//! buffered, so they can sit behind any byte stream whether framed or not.
//!
//! ## Security
//! - Declared lengths above [`MAX_MESSAGE_SIZE`] are rejected before allocation
//! - Unterminated JSON lines are rejected once they exceed the same bound

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::config::MAX_MESSAGE_SIZE;
use crate::core::message::{Message, MessageType};
use crate::error::{ChannelError, Result};

/// Supported serialization protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Length-prefixed bincode (default)
    #[default]
    Binary,
    /// Positional JSON array, one message per line
    Json,
    /// Named-field JSON object, one message per line
    #[serde(rename = "simplejson")]
    SimpleJson,
    /// Varint-prefixed MessagePack
    Compact,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::Binary,
        Protocol::Json,
        Protocol::SimpleJson,
        Protocol::Compact,
    ];

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Binary => "BINARY",
            Protocol::Json => "JSON",
            Protocol::SimpleJson => "SIMPLEJSON",
            Protocol::Compact => "COMPACT",
        }
    }

    /// Numeric selector, in declaration order
    pub fn id(self) -> u8 {
        match self {
            Protocol::Binary => 0,
            Protocol::Json => 1,
            Protocol::SimpleJson => 2,
            Protocol::Compact => 3,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Protocol {
    type Error = ChannelError;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Protocol::Binary),
            1 => Ok(Protocol::Json),
            2 => Ok(Protocol::SimpleJson),
            3 => Ok(Protocol::Compact),
            other => Err(ChannelError::UnknownProtocol(format!("protocol id {other}"))),
        }
    }
}

impl FromStr for Protocol {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Protocol::Binary),
            "json" => Ok(Protocol::Json),
            "simplejson" | "simple_json" => Ok(Protocol::SimpleJson),
            "compact" => Ok(Protocol::Compact),
            _ => Err(ChannelError::UnknownProtocol(s.to_string())),
        }
    }
}

/// A protocol-specific message reader/writer
pub trait MessageCodec: Send {
    /// Protocol this codec speaks
    fn protocol(&self) -> Protocol;

    /// Append the encoded form of `msg` to `dst`
    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<()>;

    /// Remove and decode one message from the front of `src`, if complete
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>>;
}

const BINARY_VERSION: [u8; 2] = [0x80, 0x01];
const BINARY_HEADER_LEN: usize = 6;

/// Length-prefixed bincode codec
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCodec;

impl MessageCodec for BinaryCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Binary
    }

    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<()> {
        let body = bincode::serialize(msg).map_err(|e| ChannelError::Serialize(e.to_string()))?;
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(ChannelError::OversizedMessage(body.len()));
        }

        dst.reserve(BINARY_HEADER_LEN + body.len());
        dst.put_slice(&BINARY_VERSION);
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        if src.len() < BINARY_HEADER_LEN {
            return Ok(None);
        }
        if src[..2] != BINARY_VERSION {
            return Err(ChannelError::InvalidHeader);
        }

        let len = u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(ChannelError::OversizedMessage(len));
        }
        if src.len() < BINARY_HEADER_LEN + len {
            src.reserve(BINARY_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(BINARY_HEADER_LEN);
        let body = src.split_to(len);
        bincode::deserialize(&body)
            .map(Some)
            .map_err(|e| ChannelError::Deserialize(e.to_string()))
    }
}

const COMPACT_PROTOCOL_ID: u8 = 0x82;
const MAX_VARINT_LEN: usize = 5;

/// Varint-prefixed MessagePack codec
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactCodec;

impl CompactCodec {
    /// Parse a ULEB128 length starting at `src[1]`: (value, bytes used)
    fn read_length(src: &[u8]) -> Result<Option<(usize, usize)>> {
        let mut value: u64 = 0;
        for (i, byte) in src.iter().skip(1).take(MAX_VARINT_LEN).enumerate() {
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(Some((value as usize, i + 1)));
            }
        }
        if src.len() > MAX_VARINT_LEN {
            return Err(ChannelError::InvalidHeader);
        }
        Ok(None)
    }
}

impl MessageCodec for CompactCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Compact
    }

    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<()> {
        let body = rmp_serde::to_vec(msg).map_err(|e| ChannelError::Serialize(e.to_string()))?;
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(ChannelError::OversizedMessage(body.len()));
        }

        dst.reserve(1 + MAX_VARINT_LEN + body.len());
        dst.put_u8(COMPACT_PROTOCOL_ID);
        let mut len = body.len() as u32;
        while len >= 0x80 {
            dst.put_u8((len as u8 & 0x7F) | 0x80);
            len >>= 7;
        }
        dst.put_u8(len as u8);
        dst.put_slice(&body);
        Ok(())
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        if src.is_empty() {
            return Ok(None);
        }
        if src[0] != COMPACT_PROTOCOL_ID {
            return Err(ChannelError::InvalidHeader);
        }

        let Some((len, varint_len)) = Self::read_length(src)? else {
            return Ok(None);
        };
        if len > MAX_MESSAGE_SIZE {
            return Err(ChannelError::OversizedMessage(len));
        }
        let header_len = 1 + varint_len;
        if src.len() < header_len + len {
            return Ok(None);
        }

        src.advance(header_len);
        let body = src.split_to(len);
        rmp_serde::from_slice(&body)
            .map(Some)
            .map_err(|e| ChannelError::Deserialize(e.to_string()))
    }
}

const JSON_VERSION: u8 = 1;

/// Line splitter shared by the JSON codecs, bounded by [`MAX_MESSAGE_SIZE`]
fn line_splitter() -> LinesCodec {
    LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)
}

/// Take one newline-terminated line off `src`, without the newline.
///
/// The splitter remembers how far it has scanned, so a line trickling in
/// over many reads is only searched once.
fn take_line(lines: &mut LinesCodec, src: &mut BytesMut) -> Result<Option<String>> {
    let buffered = src.len();
    lines.decode(src).map_err(|e| match e {
        LinesCodecError::MaxLineLengthExceeded => ChannelError::OversizedMessage(buffered),
        LinesCodecError::Io(e) => ChannelError::Deserialize(e.to_string()),
    })
}

fn put_line(body: Vec<u8>, dst: &mut BytesMut) -> Result<()> {
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ChannelError::OversizedMessage(body.len()));
    }
    dst.reserve(body.len() + 1);
    dst.put_slice(&body);
    dst.put_u8(b'\n');
    Ok(())
}

/// Positional JSON codec: `[version, name, type, seqid, payload]` per line
#[derive(Debug, Clone)]
pub struct JsonCodec {
    lines: LinesCodec,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self {
            lines: line_splitter(),
        }
    }
}

impl MessageCodec for JsonCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Json
    }

    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<()> {
        let envelope = (
            JSON_VERSION,
            msg.name.as_str(),
            msg.kind.id(),
            msg.seq_id,
            msg.payload.as_slice(),
        );
        let body =
            serde_json::to_vec(&envelope).map_err(|e| ChannelError::Serialize(e.to_string()))?;
        put_line(body, dst)
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        let Some(line) = take_line(&mut self.lines, src)? else {
            return Ok(None);
        };

        let (version, name, kind, seq_id, payload): (u8, String, u8, i32, Vec<u8>) =
            serde_json::from_str(&line).map_err(|e| ChannelError::Deserialize(e.to_string()))?;
        if version != JSON_VERSION {
            return Err(ChannelError::InvalidHeader);
        }
        let kind = MessageType::from_id(kind).ok_or(ChannelError::InvalidHeader)?;

        Ok(Some(Message {
            name,
            kind,
            seq_id,
            payload,
        }))
    }
}

#[derive(Serialize, Deserialize)]
struct SimpleEnvelope {
    name: String,
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(rename = "seqid")]
    seq_id: i32,
    payload: Vec<u8>,
}

/// Named-field JSON codec, one object per line
#[derive(Debug, Clone)]
pub struct SimpleJsonCodec {
    lines: LinesCodec,
}

impl Default for SimpleJsonCodec {
    fn default() -> Self {
        Self {
            lines: line_splitter(),
        }
    }
}

impl MessageCodec for SimpleJsonCodec {
    fn protocol(&self) -> Protocol {
        Protocol::SimpleJson
    }

    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<()> {
        let envelope = SimpleEnvelope {
            name: msg.name.clone(),
            kind: msg.kind,
            seq_id: msg.seq_id,
            payload: msg.payload.clone(),
        };
        let body =
            serde_json::to_vec(&envelope).map_err(|e| ChannelError::Serialize(e.to_string()))?;
        put_line(body, dst)
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        let Some(line) = take_line(&mut self.lines, src)? else {
            return Ok(None);
        };

        let envelope: SimpleEnvelope =
            serde_json::from_str(&line).map_err(|e| ChannelError::Deserialize(e.to_string()))?;
        Ok(Some(Message {
            name: envelope.name,
            kind: envelope.kind,
            seq_id: envelope.seq_id,
            payload: envelope.payload,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn codecs() -> Vec<Box<dyn MessageCodec>> {
        vec![
            Box::new(BinaryCodec),
            Box::new(JsonCodec::default()),
            Box::new(SimpleJsonCodec::default()),
            Box::new(CompactCodec),
        ]
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("binary".parse::<Protocol>().unwrap(), Protocol::Binary);
        assert_eq!("JSON".parse::<Protocol>().unwrap(), Protocol::Json);
        assert_eq!("SimpleJSON".parse::<Protocol>().unwrap(), Protocol::SimpleJson);
        assert_eq!("compact".parse::<Protocol>().unwrap(), Protocol::Compact);
        assert!(matches!(
            "thrift".parse::<Protocol>(),
            Err(ChannelError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn test_protocol_ids() {
        for protocol in Protocol::ALL {
            assert_eq!(Protocol::try_from(protocol.id()).unwrap(), protocol);
        }
        assert!(matches!(
            Protocol::try_from(4),
            Err(ChannelError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn test_default_protocol() {
        assert_eq!(Protocol::default(), Protocol::Binary);
    }

    #[test]
    fn test_partial_input_waits_for_more() {
        let msg = Message::call("echo", 1, b"ping".to_vec());
        for mut codec in codecs() {
            let mut encoded = BytesMut::new();
            codec.encode(&msg, &mut encoded).unwrap();

            let mut partial = BytesMut::from(&encoded[..encoded.len() - 1]);
            assert!(codec.decode(&mut partial).unwrap().is_none(), "{}", codec.protocol());

            partial.extend_from_slice(&encoded[encoded.len() - 1..]);
            let decoded = codec.decode(&mut partial).unwrap().expect("complete message");
            assert_eq!(decoded, msg);
            assert!(partial.is_empty());
        }
    }

    #[test]
    fn test_back_to_back_messages() {
        let first = Message::call("a", 1, vec![1, 2, 3]);
        let second = Message::oneway("b", 2, Vec::new());
        for mut codec in codecs() {
            let mut buf = BytesMut::new();
            codec.encode(&first, &mut buf).unwrap();
            codec.encode(&second, &mut buf).unwrap();
            assert_eq!(codec.decode(&mut buf).unwrap(), Some(first.clone()));
            assert_eq!(codec.decode(&mut buf).unwrap(), Some(second.clone()));
            assert_eq!(codec.decode(&mut buf).unwrap(), None);
        }
    }

    #[test]
    fn test_codecs_produce_distinct_encodings() {
        let msg = Message::call("echo", 9, b"ping".to_vec());
        let encodings: Vec<BytesMut> = codecs()
            .into_iter()
            .map(|mut codec| {
                let mut buf = BytesMut::new();
                codec.encode(&msg, &mut buf).unwrap();
                buf
            })
            .collect();
        for i in 0..encodings.len() {
            for j in (i + 1)..encodings.len() {
                assert_ne!(encodings[i], encodings[j]);
            }
        }
    }

    #[test]
    fn test_binary_rejects_bad_version() {
        let mut buf = BytesMut::from(&[0x00, 0x01, 0, 0, 0, 1, 0][..]);
        assert!(matches!(
            BinaryCodec.decode(&mut buf),
            Err(ChannelError::InvalidHeader)
        ));
    }

    #[test]
    fn test_binary_rejects_oversized_length() {
        let mut buf = BytesMut::new();
        buf.put_slice(&BINARY_VERSION);
        buf.put_u32((MAX_MESSAGE_SIZE + 1) as u32);
        assert!(matches!(
            BinaryCodec.decode(&mut buf),
            Err(ChannelError::OversizedMessage(_))
        ));
    }

    #[test]
    fn test_compact_varint_long_payload() {
        let msg = Message::call("bulk", 1, vec![0xAB; 300]);
        let mut buf = BytesMut::new();
        CompactCodec.encode(&msg, &mut buf).unwrap();
        // body is larger than 127 bytes, so the length needs two varint bytes
        assert_eq!(buf[0], COMPACT_PROTOCOL_ID);
        assert_ne!(buf[1] & 0x80, 0);
        assert_eq!(CompactCodec.decode(&mut buf).unwrap(), Some(msg));
    }

    #[test]
    fn test_compact_rejects_runaway_varint() {
        let mut buf = BytesMut::from(&[COMPACT_PROTOCOL_ID, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF][..]);
        assert!(matches!(
            CompactCodec.decode(&mut buf),
            Err(ChannelError::InvalidHeader)
        ));
    }

    #[test]
    fn test_json_envelope_shapes() {
        let msg = Message::call("echo", 5, b"hi".to_vec());

        let mut buf = BytesMut::new();
        JsonCodec::default().encode(&msg, &mut buf).unwrap();
        assert_eq!(&buf[..], b"[1,\"echo\",1,5,[104,105]]\n");

        let mut buf = BytesMut::new();
        SimpleJsonCodec::default().encode(&msg, &mut buf).unwrap();
        let line = std::str::from_utf8(&buf).unwrap();
        assert!(line.starts_with("{\"name\":\"echo\""));
        assert!(line.contains("\"seqid\":5"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_json_large_line_in_small_chunks() {
        let msg = Message::call("bulk", 3, vec![0xEE; 256 * 1024]);
        let mut codecs: Vec<Box<dyn MessageCodec>> = vec![
            Box::new(JsonCodec::default()),
            Box::new(SimpleJsonCodec::default()),
        ];
        for codec in codecs.iter_mut() {
            let mut encoded = BytesMut::new();
            codec.encode(&msg, &mut encoded).unwrap();

            let mut buf = BytesMut::new();
            let mut decoded = None;
            for chunk in encoded.chunks(512) {
                assert!(decoded.is_none(), "message completed early");
                buf.extend_from_slice(chunk);
                decoded = codec.decode(&mut buf).unwrap();
            }
            assert_eq!(decoded, Some(msg.clone()));
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_json_rejects_unterminated_oversized_line() {
        let mut buf = BytesMut::from(&vec![b'['; MAX_MESSAGE_SIZE + 1][..]);
        assert!(matches!(
            JsonCodec::default().decode(&mut buf),
            Err(ChannelError::OversizedMessage(_))
        ));
    }

    #[test]
    fn test_json_rejects_unknown_version() {
        let mut buf = BytesMut::from(&b"[2,\"echo\",1,5,[]]\n"[..]);
        assert!(matches!(
            JsonCodec::default().decode(&mut buf),
            Err(ChannelError::InvalidHeader)
        ));
    }
}
