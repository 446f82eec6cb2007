//! Example: Ping/Pong Over Every Protocol
//!
//! Starts a server on an ephemeral port for each protocol, calls it once over
//! a framed TLS channel and shuts it down again.
//!
//! Run with: `cargo run --example ping_pong`

use rpc_channel::config::LoggingConfig;
use rpc_channel::utils::logging;
use rpc_channel::{
    build_client, build_server, ApplicationError, ChannelError, Configuration, Dispatcher,
    Protocol,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&LoggingConfig::default())?;

    for protocol in Protocol::ALL {
        let config = Configuration::new(protocol, true, true, true);

        let dispatcher = Dispatcher::new();
        dispatcher.register("ping", |args| match args {
            b"ping" => Ok(b"pong".to_vec()),
            _ => Err(ApplicationError::internal("expected ping")),
        })?;

        let server = build_server("127.0.0.1:0", config, dispatcher).await?;
        let mut bound = server.bound_address();
        let closer = server.closer();
        let mut failures = server.start();
        let Some(local_addr) = bound.wait().await else {
            let cause = failures.recv().await.unwrap_or(ChannelError::ConnectionClosed);
            return Err(cause.into());
        };

        let (mut client, transport) = build_client(&local_addr.to_string(), config).await?;
        let reply = client.call("ping", b"ping".to_vec()).await;
        transport.close().await?;
        println!("{:<10} -> {}", protocol.name(), String::from_utf8_lossy(&reply?));

        closer.close();
        if let Some(e) = failures.recv().await {
            return Err(e.into());
        }
    }

    Ok(())
}
