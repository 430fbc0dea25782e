//! Connection session
//!
//! One `Session` per accepted WebSocket. It registers with the subscription
//! registry, turns inbound commands into registry calls, writes pushes from
//! its poll tasks to the socket, and runs the keepalive cycle.
//!
//! Lifecycle: `Open` → `Active` → `Closing` → `Closed`, forward only. Any
//! read error, write error, peer close, idle timeout or protocol violation
//! moves the session to `Closing`; from there it unregisters exactly once
//! and closes the transport. Writes share the idle deadline, so a peer that
//! stops reading cannot hold the session open.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::config::SessionSettings;
use crate::registry::{Connection, ConnectionId, SubscriptionRegistry};
use crate::transport::message::{ClientMessage, ServerMessage};

/// Upper bound on the closing handshake, so a half-open peer cannot hold a
/// finished session.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Open,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Move forward to `next`. Backward or repeated moves are refused and
    /// leave the state untouched.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// Why a session left the `Active` loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    ReadError(String),
    WriteError(String),
    ProtocolViolation(String),
    IdleTimeout,
    /// The registry dropped the connection (server shutdown).
    Deregistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&SessionSettings> for KeepAlive {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            ping_interval: settings.ping_interval(),
            idle_timeout: settings.idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub connection_id: ConnectionId,
    pub reason: CloseReason,
    pub state: SessionState,
    pub cancelled_tasks: usize,
}

pub struct Session<S> {
    connection_id: ConnectionId,
    state: SessionState,
    registry: Arc<SubscriptionRegistry>,
    keepalive: KeepAlive,
    ws: WebSocketStream<S>,
    pushes: UnboundedReceiver<ServerMessage>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an accepted WebSocket and register it with `registry`.
    pub fn accept(
        ws: WebSocketStream<S>,
        registry: Arc<SubscriptionRegistry>,
        keepalive: KeepAlive,
    ) -> Self {
        let (tx, pushes) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);
        let connection_id = connection.id.clone();
        registry.register(connection);

        Self {
            connection_id,
            state: SessionState::Open,
            registry,
            keepalive,
            ws,
            pushes,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until it closes.
    pub async fn run(self) -> SessionOutcome {
        let Session {
            connection_id,
            mut state,
            registry,
            keepalive,
            ws,
            mut pushes,
        } = self;
        let (mut sink, mut stream) = ws.split();

        let mut ping = tokio::time::interval_at(
            Instant::now() + keepalive.ping_interval,
            keepalive.ping_interval.max(Duration::from_millis(1)),
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let idle = tokio::time::sleep(keepalive.idle_timeout);
        tokio::pin!(idle);

        let reason = loop {
            tokio::select! {
                frame = stream.next() => {
                    let frame = match frame {
                        None | Some(Ok(WsMessage::Close(_))) => break CloseReason::PeerClosed,
                        Some(Err(e)) => break CloseReason::ReadError(e.to_string()),
                        Some(Ok(frame)) => frame,
                    };
                    idle.as_mut().reset(Instant::now() + keepalive.idle_timeout);

                    match ClientMessage::decode(&frame) {
                        Ok(Some(command)) => {
                            if !apply_command(&registry, &connection_id, command) {
                                break CloseReason::Deregistered;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(connection = %connection_id, error = %e, "protocol violation");
                            let notice = ServerMessage::Error { message: e.to_string() };
                            if let Ok(frame) = notice.to_frame() {
                                let _ = tokio::time::timeout_at(idle.deadline(), sink.send(frame)).await;
                            }
                            break CloseReason::ProtocolViolation(e.to_string());
                        }
                    }
                    state.advance(SessionState::Active);
                }

                push = pushes.recv() => {
                    let Some(push) = push else {
                        break CloseReason::Deregistered;
                    };
                    let frame = match push.to_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(connection = %connection_id, error = %e, "failed to encode push");
                            continue;
                        }
                    };
                    match tokio::time::timeout_at(idle.deadline(), sink.send(frame)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => break CloseReason::WriteError(e.to_string()),
                        Err(_) => break CloseReason::IdleTimeout,
                    }
                }

                _ = ping.tick() => {
                    let ping_frame = WsMessage::Ping(Vec::new().into());
                    match tokio::time::timeout_at(idle.deadline(), sink.send(ping_frame)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => break CloseReason::WriteError(e.to_string()),
                        Err(_) => break CloseReason::IdleTimeout,
                    }
                    state.advance(SessionState::Active);
                }

                _ = &mut idle => break CloseReason::IdleTimeout,
            }
        };

        state.advance(SessionState::Closing);
        debug!(connection = %connection_id, ?reason, "session closing");

        let cancelled_tasks = registry.unregister(&connection_id);
        if tokio::time::timeout(CLOSE_GRACE, sink.close()).await.is_err() {
            debug!(connection = %connection_id, "close handshake timed out");
        }
        state.advance(SessionState::Closed);

        info!(connection = %connection_id, ?reason, cancelled_tasks, "session closed");
        SessionOutcome {
            connection_id,
            reason,
            state,
            cancelled_tasks,
        }
    }
}

/// Returns `false` when the registry no longer knows the connection.
fn apply_command(
    registry: &SubscriptionRegistry,
    connection_id: &str,
    command: ClientMessage,
) -> bool {
    match command {
        ClientMessage::Subscribe { queue_id } => {
            match registry.subscribe(connection_id, &queue_id) {
                Ok(_) => true,
                Err(e) => {
                    warn!(connection = %connection_id, queue = %queue_id, error = %e, "subscribe rejected");
                    false
                }
            }
        }
        ClientMessage::Unsubscribe { queue_id } => {
            if !registry.unsubscribe(connection_id, &queue_id) {
                debug!(connection = %connection_id, queue = %queue_id, "unsubscribe for unknown subscription");
            }
            registry.is_registered(connection_id)
        }
    }
}
