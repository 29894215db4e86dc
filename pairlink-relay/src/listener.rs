//! Connection acceptor.

use crate::error::Result;
use crate::router;
use crate::server::ChatRelay;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind the configured chat address and serve forever.
pub async fn run(relay: Arc<ChatRelay>) -> Result<()> {
    let bind_address = relay.config().server.bind_address.clone();
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(addr = %bind_address, "relay listening");
    serve(relay, listener).await
}

/// Accept connections indefinitely, one router task per connection.
///
/// Returns only on accept failure, which is fatal to the process: the
/// server cannot take further connections.
pub async fn serve(relay: Arc<ChatRelay>, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        relay
            .metrics()
            .connections_total
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%addr, "accepted connection");
        let relay = Arc::clone(&relay);
        tokio::spawn(router::run_connection(relay, stream, addr));
    }
}
