//! Registry lookups for codecs and transport wrappers

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use rpc_channel::core::serialization::Protocol;
use rpc_channel::error::ChannelError;
use rpc_channel::protocol::registry::{codec_factory, ProtocolRegistry};
use rpc_channel::transport::chain::{transport_chain, TransportRegistry};
use rpc_channel::{Message, TransportConfig};
use std::sync::Arc;

#[test]
fn test_every_protocol_is_registered() {
    for protocol in Protocol::ALL {
        let factory = codec_factory(protocol).expect("registered");
        assert_eq!(factory.protocol(), protocol);
    }
}

#[test]
fn test_factories_are_distinct() {
    let factories: Vec<_> = Protocol::ALL
        .iter()
        .map(|p| codec_factory(*p).unwrap())
        .collect();

    for i in 0..factories.len() {
        for j in (i + 1)..factories.len() {
            assert!(!Arc::ptr_eq(&factories[i], &factories[j]));
        }
    }

    let msg = Message::call("echo", 1, b"ping".to_vec());
    let mut encodings = Vec::new();
    for factory in &factories {
        let mut buf = BytesMut::new();
        factory.codec().encode(&msg, &mut buf).unwrap();
        assert!(!encodings.contains(&buf), "{} duplicates another codec", factory.protocol());
        encodings.push(buf);
    }
}

#[test]
fn test_global_registry_is_shared() {
    let a = ProtocolRegistry::global().lookup(Protocol::Json).unwrap();
    let b = ProtocolRegistry::global().lookup(Protocol::Json).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_unregistered_protocol_fails() {
    let mut registry = ProtocolRegistry::empty();
    registry.register(codec_factory(Protocol::Binary).unwrap());

    assert!(registry.lookup(Protocol::Binary).is_ok());
    assert!(matches!(
        registry.lookup(Protocol::SimpleJson),
        Err(ChannelError::UnknownProtocol(_))
    ));
}

#[test]
fn test_unknown_protocol_selectors() {
    assert!(matches!(
        Protocol::try_from(200u8),
        Err(ChannelError::UnknownProtocol(_))
    ));
    assert!(matches!(
        "xml".parse::<Protocol>(),
        Err(ChannelError::UnknownProtocol(_))
    ));
}

#[test]
fn test_transport_registry_covers_both_flags() {
    let registry = TransportRegistry::global();
    assert_eq!(registry.lookup(true).unwrap().describe(), "buffered(8192)");
    assert_eq!(registry.lookup(false).unwrap().describe(), "identity");
}

#[test]
fn test_framing_is_always_outermost() {
    let config = TransportConfig::default();
    for buffered in [true, false] {
        let chain = transport_chain(buffered, true, &config).unwrap();
        let description = chain.describe();
        assert!(description.starts_with("framed("), "{description}");
        let base = TransportRegistry::global().lookup(buffered).unwrap().describe();
        assert_eq!(description, format!("framed({base})"));
    }
}
