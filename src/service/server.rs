//! # Server Handle
//!
//! Binds a listening socket, composes the same transport/protocol chain as
//! the client for every accepted connection, and runs the accept loop in the
//! background once started.
//!
//! ## Lifecycle
//! - [`build_server`] resolves the codec and wrapping and provisions TLS
//!   material; those failures are returned as [`ChannelError::ServerBuild`]
//!   and no handle is produced. It does not touch the network.
//! - [`ServerHandle::start`] logs a startup notice, spawns the task that binds
//!   and runs the accept loop, and returns a [`FailureChannel`]. A bind
//!   failure (address in use, permission denied) arrives on that channel.
//! - The failure channel receives at most one error and is closed exactly
//!   once, when the loop ends. A clean stop closes it without a value.
//! - [`BoundAddress::wait`] resolves to the listening address once bound,
//!   which is how callers learn the port picked for `:0`.
//! - [`ListenerCloser::close`] closes the listening socket from outside; open
//!   connections finish their current request and the loop returns cleanly.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::ServerConfig;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Configuration, TransportConfig};
use crate::core::message::{Message, MessageType};
use crate::error::{ChannelError, Result};
use crate::protocol::processor::Processor;
use crate::protocol::registry::{codec_factory, CodecFactory};
use crate::service::channel::Channel;
use crate::transport::chain::{transport_chain, TransportFactory};
use crate::transport::socket::{self, Listener};
use crate::transport::tls;

pub use crate::transport::socket::ListenerCloser;

/// Receives the terminal error of a started server, if any
pub type FailureChannel = mpsc::Receiver<ChannelError>;

/// Resolves to the address a started server is listening on
#[derive(Debug, Clone)]
pub struct BoundAddress {
    rx: watch::Receiver<Option<SocketAddr>>,
}

impl BoundAddress {
    /// Wait until the listener is bound. `None` if the server stopped, or was
    /// dropped, before binding.
    pub async fn wait(&mut self) -> Option<SocketAddr> {
        self.rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|addr| *addr)
    }

    /// The bound address, if binding has already happened
    pub fn get(&self) -> Option<SocketAddr> {
        *self.rx.borrow()
    }
}

/// Bind-then-serve loop for one address
struct SimpleServer {
    processor: Arc<dyn Processor>,
    tls: Option<Arc<ServerConfig>>,
    transports: Arc<dyn TransportFactory>,
    codecs: Arc<dyn CodecFactory>,
    handshake_timeout: Duration,
}

/// A built, not yet started, RPC server
pub struct ServerHandle {
    server: SimpleServer,
    addr: String,
    ca_pem: Option<String>,
    closer: ListenerCloser,
    bound: watch::Sender<Option<SocketAddr>>,
}

impl ServerHandle {
    /// Address the server was built with
    pub fn address(&self) -> &str {
        &self.addr
    }

    /// Handle resolving to the address actually bound, with ephemeral ports resolved
    pub fn bound_address(&self) -> BoundAddress {
        BoundAddress {
            rx: self.bound.subscribe(),
        }
    }

    /// PEM of the generated CA when secure, for clients that verify
    pub fn ca_certificate_pem(&self) -> Option<&str> {
        self.ca_pem.as_deref()
    }

    /// Handle that closes the listening socket, usable before `start`
    pub fn closer(&self) -> ListenerCloser {
        self.closer.clone()
    }

    /// Bind and run the accept loop in the background
    pub fn start(self) -> FailureChannel {
        info!(
            address = %self.addr,
            secure = self.server.tls.is_some(),
            "Starting RPC server"
        );
        let serve = self.server.serve(self.addr.clone(), self.closer, self.bound);
        supervise(self.addr, serve)
    }
}

/// Spawn `serve` and report its outcome on a single-slot channel
fn supervise<F>(address: String, serve: F) -> FailureChannel
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let (failures, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if let Err(e) = serve.await {
            error!(%address, error = %e, "RPC server failed");
            let _ = failures.send(e).await;
        }
        info!(%address, "Stopping RPC server");
    });
    rx
}

/// Errors after which the listener is still usable
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

impl SimpleServer {
    async fn serve(
        self,
        address: String,
        closer: ListenerCloser,
        bound: watch::Sender<Option<SocketAddr>>,
    ) -> Result<()> {
        let listener = Listener::bind_with(&address, self.tls.clone(), closer).await?;
        info!(%address, local_addr = %listener.local_addr(), "RPC server listening");
        bound.send_replace(Some(listener.local_addr()));

        let shutdown = listener.shutdown_token().clone();
        let mut connections = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(Some((stream, peer))) => {
                        connections.spawn(handle_connection(
                            stream,
                            peer,
                            listener.acceptor(),
                            self.handshake_timeout,
                            self.transports.clone(),
                            self.codecs.clone(),
                            self.processor.clone(),
                            shutdown.child_token(),
                        ));
                    }
                    Ok(None) => break Ok(()),
                    Err(e) if is_transient(&e) => {
                        warn!(error = %e, "Transient accept error");
                    }
                    Err(e) => break Err(ChannelError::Io(e)),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Connection task panicked");
                    }
                }
            }
        };

        shutdown.cancel();
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Connection task panicked");
            }
        }
        outcome
    }
}

#[allow(clippy::too_many_arguments)]
#[instrument(name = "connection", skip_all, fields(%peer))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    handshake_timeout: Duration,
    transports: Arc<dyn TransportFactory>,
    codecs: Arc<dyn CodecFactory>,
    processor: Arc<dyn Processor>,
    shutdown: CancellationToken,
) {
    let base = match socket::establish(stream, acceptor, handshake_timeout).await {
        Ok(base) => base,
        Err(e) => {
            warn!(error = %e, "Connection setup failed");
            return;
        }
    };
    let transport = match transports.wrap(base) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "Failed to wrap transport");
            return;
        }
    };

    debug!("Connection established");
    let mut channel = Channel::new(transport, codecs.as_ref());
    match serve_requests(&mut channel, processor.as_ref(), &shutdown).await {
        Ok(()) => debug!("Connection closed"),
        Err(e) => warn!(error = %e, "Connection ended with error"),
    }
    let _ = channel.close().await;
}

async fn serve_requests(
    channel: &mut Channel,
    processor: &dyn Processor,
    shutdown: &CancellationToken,
) -> Result<()> {
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            request = channel.recv() => request?,
        };
        let Some(request) = request else {
            return Ok(());
        };

        match request.kind {
            MessageType::Call => {
                let reply = match processor.process(&request.name, &request.payload) {
                    Ok(payload) => Message::reply(&request, payload),
                    Err(e) => {
                        debug!(method = %request.name, error = %e, "Call raised an exception");
                        Message::exception(&request, &e)?
                    }
                };
                channel.send(reply).await?;
            }
            MessageType::Oneway => {
                if let Err(e) = processor.process(&request.name, &request.payload) {
                    warn!(method = %request.name, error = %e, "Oneway call failed");
                }
            }
            other => {
                return Err(ChannelError::Deserialize(format!(
                    "unexpected {other:?} message from client"
                )));
            }
        }
    }
}

/// Build a server with default transport settings
pub async fn build_server<P: Processor>(
    address: &str,
    configuration: Configuration,
    processor: P,
) -> Result<ServerHandle> {
    build_server_with(address, configuration, &TransportConfig::default(), processor).await
}

/// Resolve codec and wrapping and provision TLS when secure. Binding is
/// left to [`ServerHandle::start`].
#[instrument(skip(transport_config, processor), fields(protocol = %configuration.protocol))]
pub async fn build_server_with<P: Processor>(
    address: &str,
    configuration: Configuration,
    transport_config: &TransportConfig,
    processor: P,
) -> Result<ServerHandle> {
    let codecs = codec_factory(configuration.protocol)?;
    let transports = transport_chain(
        configuration.buffered,
        configuration.framed,
        transport_config,
    )
    .map_err(ChannelError::server_build)?;

    let (tls, ca_pem) = if configuration.secure {
        let provisioned =
            tls::provision(&tls::default_identities(address)).map_err(ChannelError::server_build)?;
        (Some(provisioned.server), Some(provisioned.ca_pem))
    } else {
        (None, None)
    };

    let (bound, _) = watch::channel(None);
    Ok(ServerHandle {
        server: SimpleServer {
            processor: Arc::new(processor),
            tls,
            transports,
            codecs,
            handshake_timeout: transport_config.handshake_timeout,
        },
        addr: address.to_string(),
        ca_pem,
        closer: ListenerCloser::new(),
        bound,
    })
}
