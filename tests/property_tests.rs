//! Property-based tests using proptest
//!
//! Codecs and the framing wrapper must reassemble messages no matter how the
//! underlying stream splits them, and must never panic on hostile input.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use proptest::prelude::*;
use rpc_channel::core::serialization::Protocol;
use rpc_channel::protocol::registry::codec_factory;
use rpc_channel::transport::framed::FramedTransport;
use rpc_channel::{Message, MessageType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn any_protocol() -> impl Strategy<Value = Protocol> {
    prop::sample::select(Protocol::ALL.to_vec())
}

fn any_message() -> impl Strategy<Value = Message> {
    (
        "[a-zA-Z_][a-zA-Z0-9_.]{0,32}",
        prop_oneof![
            Just(MessageType::Call),
            Just(MessageType::Reply),
            Just(MessageType::Exception),
            Just(MessageType::Oneway),
        ],
        any::<i32>(),
        prop::collection::vec(any::<u8>(), 0..2048),
    )
        .prop_map(|(name, kind, seq_id, payload)| Message {
            name,
            kind,
            seq_id,
            payload,
        })
}

/// Feed `bytes` to a decoder in pieces cut at `cuts`, collecting messages
fn decode_in_pieces(protocol: Protocol, bytes: &[u8], cuts: &[usize]) -> Vec<Message> {
    let mut codec = codec_factory(protocol).unwrap().codec();
    let mut positions: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    positions.push(bytes.len());
    positions.sort_unstable();

    let mut buf = BytesMut::new();
    let mut decoded = Vec::new();
    let mut start = 0;
    for end in positions {
        buf.extend_from_slice(&bytes[start..end]);
        start = end;
        while let Some(msg) = codec.decode(&mut buf).expect("valid stream") {
            decoded.push(msg);
        }
    }
    assert!(buf.is_empty(), "{} bytes left over", buf.len());
    decoded
}

proptest! {
    // Property: a stream of messages decodes identically under any split
    #[test]
    fn prop_codec_survives_arbitrary_splits(
        protocol in any_protocol(),
        messages in prop::collection::vec(any_message(), 1..4),
        cuts in prop::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut codec = codec_factory(protocol).unwrap().codec();
        let mut stream = BytesMut::new();
        for msg in &messages {
            codec.encode(msg, &mut stream).unwrap();
        }

        let decoded = decode_in_pieces(protocol, &stream, &cuts);
        prop_assert_eq!(decoded, messages);
    }

    // Property: decoders return an error or wait for more, never panic
    #[test]
    fn prop_codec_never_panics_on_garbage(
        protocol in any_protocol(),
        data in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let mut codec = codec_factory(protocol).unwrap().codec();
        let mut buf = BytesMut::from(&data[..]);
        for _ in 0..8 {
            match codec.decode(&mut buf) {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    }

    // Property: an incomplete message is never reported as complete
    #[test]
    fn prop_truncated_message_waits(
        protocol in any_protocol(),
        msg in any_message(),
        cut in any::<usize>(),
    ) {
        let mut codec = codec_factory(protocol).unwrap().codec();
        let mut encoded = BytesMut::new();
        codec.encode(&msg, &mut encoded).unwrap();

        let cut = cut % encoded.len();
        let mut partial = BytesMut::from(&encoded[..cut]);
        prop_assert!(matches!(codec.decode(&mut partial), Ok(None)));
    }

    // Property: framed writes arrive intact whatever the write sizes
    #[test]
    fn prop_framing_preserves_chunked_writes(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..8),
        pipe in 1usize..256,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let expected: Vec<u8> = chunks.concat();
        let received = runtime.block_on(async move {
            let (a, b) = tokio::io::duplex(pipe);
            let mut writer = FramedTransport::new(a, 64 * 1024);
            let mut reader = FramedTransport::new(b, 64 * 1024);
            let total: usize = chunks.iter().map(Vec::len).sum();

            let write = async move {
                for chunk in &chunks {
                    writer.write_all(chunk).await.unwrap();
                    writer.flush().await.unwrap();
                }
                writer.shutdown().await.unwrap();
            };
            let read = async move {
                let mut out = vec![0u8; total];
                reader.read_exact(&mut out).await.unwrap();
                let mut rest = Vec::new();
                reader.read_to_end(&mut rest).await.unwrap();
                assert!(rest.is_empty());
                out
            };
            let ((), out) = tokio::join!(write, read);
            out
        });

        prop_assert_eq!(received, expected);
    }
}
