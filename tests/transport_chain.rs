//! Round trips through composed transport chains over an in-memory loopback

#![allow(clippy::expect_used, clippy::unwrap_used)]

use rpc_channel::core::serialization::Protocol;
use rpc_channel::protocol::registry::codec_factory;
use rpc_channel::service::channel::Channel;
use rpc_channel::transport::chain::transport_chain;
use rpc_channel::transport::BoxTransport;
use rpc_channel::{Message, TransportConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const COMBINATIONS: [(bool, bool); 4] = [(false, false), (true, false), (false, true), (true, true)];

fn loopback(buffered: bool, framed: bool) -> (BoxTransport, BoxTransport) {
    let config = TransportConfig::default();
    let chain = transport_chain(buffered, framed, &config).unwrap();
    let (a, b) = tokio::io::duplex(64 * 1024);
    (
        chain.wrap(Box::new(a)).unwrap(),
        chain.wrap(Box::new(b)).unwrap(),
    )
}

#[tokio::test]
async fn test_raw_payload_survives_every_chain() {
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();

    for (buffered, framed) in COMBINATIONS {
        let (mut sender, mut receiver) = loopback(buffered, framed);

        let sent = payload.clone();
        let writer = async move {
            sender.write_all(&sent).await.unwrap();
            sender.flush().await.unwrap();
            sender
        };
        let len = payload.len();
        let reader = async move {
            let mut received = vec![0u8; len];
            receiver.read_exact(&mut received).await.unwrap();
            received
        };

        let (_sender, received) = tokio::join!(writer, reader);
        assert_eq!(received, payload, "buffered={buffered} framed={framed}");
    }
}

#[tokio::test]
async fn test_messages_survive_every_chain_and_protocol() {
    for protocol in Protocol::ALL {
        let codecs = codec_factory(protocol).unwrap();
        for (buffered, framed) in COMBINATIONS {
            let (left, right) = loopback(buffered, framed);
            let mut client = Channel::new(left, codecs.as_ref());
            let mut server = Channel::new(right, codecs.as_ref());
            assert_eq!(client.protocol(), protocol);

            let request = Message::call("echo", 1, b"ping".to_vec());
            client.send(request.clone()).await.unwrap();
            let received = server.recv().await.unwrap().expect("request");
            assert_eq!(
                received, request,
                "{protocol} buffered={buffered} framed={framed}"
            );

            let reply = Message::reply(&received, b"pong".to_vec());
            server.send(reply.clone()).await.unwrap();
            assert_eq!(client.recv().await.unwrap(), Some(reply));
        }
    }
}

#[tokio::test]
async fn test_close_is_seen_as_end_of_stream() {
    let codecs = codec_factory(Protocol::Binary).unwrap();
    for (buffered, framed) in COMBINATIONS {
        let (left, right) = loopback(buffered, framed);
        let mut client = Channel::new(left, codecs.as_ref());
        let mut server = Channel::new(right, codecs.as_ref());

        client
            .send(Message::oneway("bye", 1, Vec::new()))
            .await
            .unwrap();
        client.close().await.unwrap();

        assert!(server.recv().await.unwrap().is_some());
        assert!(server.recv().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_framed_chain_emits_length_prefix() {
    let config = TransportConfig::default();
    let chain = transport_chain(true, true, &config).unwrap();
    let (a, mut raw) = tokio::io::duplex(1024);
    let mut framed = chain.wrap(Box::new(a)).unwrap();

    framed.write_all(b"abc").await.unwrap();
    framed.flush().await.unwrap();

    let mut bytes = [0u8; 7];
    raw.read_exact(&mut bytes).await.unwrap();
    assert_eq!(&bytes[..4], &3u32.to_be_bytes());
    assert_eq!(&bytes[4..], b"abc");
}
