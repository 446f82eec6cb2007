//! Plain and TLS sockets: the base link of every transport chain.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ChannelError, Result};
use crate::transport::tls::server_name;
use crate::transport::BoxTransport;

fn connection_error(address: &str, source: io::Error) -> ChannelError {
    ChannelError::Connection {
        address: address.to_string(),
        source,
    }
}

/// Open a socket to `address`, running a TLS handshake when `tls` is set.
///
/// Every failure, including either timeout expiring, is a
/// [`ChannelError::Connection`].
#[instrument(skip(tls), fields(secure = tls.is_some()))]
pub async fn connect(
    address: &str,
    tls: Option<Arc<ClientConfig>>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<BoxTransport> {
    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(address))
        .await
        .map_err(|_| {
            connection_error(
                address,
                io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            )
        })?
        .map_err(|e| connection_error(address, e))?;
    stream
        .set_nodelay(true)
        .map_err(|e| connection_error(address, e))?;

    let Some(tls) = tls else {
        debug!("Plain connection established");
        return Ok(Box::new(stream));
    };

    let domain = server_name(address)?;
    let tls_stream = tokio::time::timeout(
        handshake_timeout,
        TlsConnector::from(tls).connect(domain, stream),
    )
    .await
    .map_err(|_| {
        connection_error(
            address,
            io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"),
        )
    })?
    .map_err(|e| connection_error(address, e))?;

    debug!("TLS connection established");
    Ok(Box::new(tls_stream))
}

/// Stops a [`Listener`] from outside the task that owns it
#[derive(Debug, Clone, Default)]
pub struct ListenerCloser {
    token: CancellationToken,
}

impl ListenerCloser {
    /// A closer not yet tied to any listener; see [`Listener::bind_with`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the listening socket; the serve loop winds down and returns
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A bound listening socket, optionally terminating TLS
pub struct Listener {
    tcp: TcpListener,
    tls: Option<TlsAcceptor>,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl Listener {
    /// Bind `address`. Bind failures are returned as [`ChannelError::Io`].
    pub async fn bind(address: &str, tls: Option<Arc<ServerConfig>>) -> Result<Self> {
        Self::bind_with(address, tls, ListenerCloser::new()).await
    }

    /// Bind `address`, stopping when `closer` is closed. A closer that is
    /// already closed yields a listener that accepts nothing.
    #[instrument(skip(tls, closer), fields(secure = tls.is_some()))]
    pub async fn bind_with(
        address: &str,
        tls: Option<Arc<ServerConfig>>,
        closer: ListenerCloser,
    ) -> Result<Self> {
        let tcp = TcpListener::bind(address).await?;
        let local_addr = tcp.local_addr()?;
        debug!(%local_addr, "Listening socket bound");

        Ok(Self {
            tcp,
            tls: tls.map(TlsAcceptor::from),
            local_addr,
            shutdown: closer.token,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    pub fn closer(&self) -> ListenerCloser {
        ListenerCloser {
            token: self.shutdown.clone(),
        }
    }

    /// Token cancelled when the listener is closed
    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn acceptor(&self) -> Option<TlsAcceptor> {
        self.tls.clone()
    }

    /// Wait for the next connection, or `None` once closed
    pub async fn accept(&self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(None),
            accepted = self.tcp.accept() => accepted.map(Some),
        }
    }
}

/// Complete the server side of a connection: TLS handshake when configured
pub(crate) async fn establish(
    stream: TcpStream,
    acceptor: Option<TlsAcceptor>,
    handshake_timeout: Duration,
) -> Result<BoxTransport> {
    let _ = stream.set_nodelay(true);
    match acceptor {
        None => Ok(Box::new(stream)),
        Some(acceptor) => {
            let tls_stream = tokio::time::timeout(handshake_timeout, acceptor.accept(stream))
                .await
                .map_err(|_| ChannelError::Timeout)?
                .map_err(|e| ChannelError::Tls(format!("TLS handshake failed: {e}")))?;
            Ok(Box::new(tls_stream))
        }
    }
}
