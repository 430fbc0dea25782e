//! Connection representation
//!
//! `Connection` is the registry's view of one live session: an opaque id and
//! the sending side of the session's push channel. The registry never looks
//! inside either; the id is only a map key.

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::transport::message::ServerMessage;

pub type ConnectionId = String;

#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: UnboundedSender<ServerMessage>,
}

impl Connection {
    /// Create a connection with a fresh `client-<uuid>` id.
    pub fn new(sender: UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            sender,
        }
    }
}
