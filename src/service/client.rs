//! # Client Assembler
//!
//! Builds a ready-to-use RPC client from an address and a [`Configuration`].
//!
//! The returned [`ClientTransport`] owns the connection's lifetime: the
//! assembler never closes it, so callers must call
//! [`ClientTransport::close`] on every exit path.
//!
//! ```rust,no_run
//! use rpc_channel::config::Configuration;
//! use rpc_channel::service::client::build_client;
//!
//! # async fn run() -> rpc_channel::error::Result<()> {
//! let (mut client, transport) = build_client("127.0.0.1:9090", Configuration::default()).await?;
//! let reply = client.call("echo", b"ping".to_vec()).await;
//! transport.close().await?;
//! let _ = reply?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::config::{Configuration, TransportConfig};
use crate::core::message::{Message, MessageType};
use crate::error::{ApplicationError, ApplicationErrorKind, ChannelError, Result};
use crate::protocol::registry::codec_factory;
use crate::service::channel::Channel;
use crate::transport::chain::transport_chain;
use crate::transport::socket;
use crate::transport::tls;
use crate::utils::timeout::with_timeout;

type SharedChannel = Arc<Mutex<Option<Channel>>>;

/// RPC call handle bound to one assembled connection
pub struct Client {
    channel: SharedChannel,
    seq_id: i32,
    response_timeout: Duration,
}

/// Closeable resource owning the client's connection
#[derive(Clone)]
pub struct ClientTransport {
    channel: SharedChannel,
}

impl ClientTransport {
    /// Flush and shut down the connection; later calls on the client fail
    pub async fn close(&self) -> Result<()> {
        let channel = self.channel.lock().await.take();
        match channel {
            Some(mut channel) => {
                debug!("Closing client transport");
                channel.close().await
            }
            None => Ok(()),
        }
    }

    pub async fn is_open(&self) -> bool {
        self.channel.lock().await.is_some()
    }
}

impl Client {
    /// Invoke `method` and wait for its reply payload
    pub async fn call(&mut self, method: &str, args: impl Into<Vec<u8>>) -> Result<Vec<u8>> {
        self.seq_id = self.seq_id.wrapping_add(1);
        let seq_id = self.seq_id;

        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(ChannelError::ConnectionClosed)?;
        channel.send(Message::call(method, seq_id, args)).await?;

        let reply = with_timeout(self.response_timeout, async {
            loop {
                let reply = channel.recv().await?.ok_or(ChannelError::ConnectionClosed)?;
                // replies to calls that already timed out
                if is_stale(reply.seq_id, seq_id) {
                    debug!(method = %reply.name, seq_id = reply.seq_id, "Discarding late reply");
                    continue;
                }
                return Ok(reply);
            }
        })
        .await?;

        if reply.seq_id != seq_id {
            return Err(ApplicationError::new(
                ApplicationErrorKind::BadSequenceId,
                format!("{method}: expected seq id {seq_id}, got {}", reply.seq_id),
            )
            .into());
        }
        if reply.name != method {
            return Err(ApplicationError::new(
                ApplicationErrorKind::WrongMethodName,
                format!("{method}: reply names {}", reply.name),
            )
            .into());
        }

        match reply.kind {
            MessageType::Reply => Ok(reply.payload),
            MessageType::Exception => Err(reply.application_error()?.into()),
            other => Err(ApplicationError::new(
                ApplicationErrorKind::InvalidMessageType,
                format!("{method}: unexpected {other:?} in reply"),
            )
            .into()),
        }
    }

    /// Send `method` without waiting for a reply
    pub async fn oneway(&mut self, method: &str, args: impl Into<Vec<u8>>) -> Result<()> {
        self.seq_id = self.seq_id.wrapping_add(1);
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(ChannelError::ConnectionClosed)?;
        channel
            .send(Message::oneway(method, self.seq_id, args))
            .await
    }
}

/// Whether `received` was issued before `expected`, allowing for wrap-around
fn is_stale(received: i32, expected: i32) -> bool {
    expected.wrapping_sub(received) > 0
}

/// Build a client with default transport settings
pub async fn build_client(
    address: &str,
    configuration: Configuration,
) -> Result<(Client, ClientTransport)> {
    build_client_with(address, configuration, &TransportConfig::default()).await
}

/// Resolve codec and wrapping, connect, and bind both codecs to the connection
#[instrument(skip(transport_config), fields(protocol = %configuration.protocol))]
pub async fn build_client_with(
    address: &str,
    configuration: Configuration,
    transport_config: &TransportConfig,
) -> Result<(Client, ClientTransport)> {
    let codecs = codec_factory(configuration.protocol)?;
    let wrapping = transport_chain(
        configuration.buffered,
        configuration.framed,
        transport_config,
    )
    .map_err(ChannelError::client_build)?;

    let tls_config = if configuration.secure {
        Some(tls::client_config(&transport_config.trust).map_err(ChannelError::client_build)?)
    } else {
        None
    };

    let base = socket::connect(
        address,
        tls_config,
        transport_config.connect_timeout,
        transport_config.handshake_timeout,
    )
    .await?;
    let transport = wrapping.wrap(base).map_err(ChannelError::client_build)?;

    let channel: SharedChannel = Arc::new(Mutex::new(Some(Channel::new(
        transport,
        codecs.as_ref(),
    ))));
    info!(%address, chain = %wrapping.describe(), "Client connected");

    Ok((
        Client {
            channel: channel.clone(),
            seq_id: 0,
            response_timeout: transport_config.response_timeout,
        },
        ClientTransport { channel },
    ))
}
