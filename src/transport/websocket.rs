//! WebSocket transport
//!
//! Accepts TCP connections, upgrades them to WebSockets and hands each one
//! to its own `Session` task. Everything after the handshake (commands,
//! pushes, keepalive, teardown) lives in the session.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};

use crate::registry::SubscriptionRegistry;
use crate::transport::session::{KeepAlive, Session};

pub async fn start_websocket_server(
    addr: String,
    registry: Arc<SubscriptionRegistry>,
    keepalive: KeepAlive,
) -> io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    serve(listener, registry, keepalive).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<SubscriptionRegistry>,
    keepalive: KeepAlive,
) -> io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {e}");
                return Err(e);
            }
        };
        tokio::spawn(handle_connection(stream, peer, registry.clone(), keepalive));
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<SubscriptionRegistry>,
    keepalive: KeepAlive,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "WebSocket handshake error: {e}");
            return;
        }
    };

    let session = Session::accept(ws_stream, registry, keepalive);
    info!(%peer, connection = %session.connection_id(), "session opened");
    session.run().await;
}
