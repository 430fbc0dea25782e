use serde::{Deserialize, Serialize};
use tungstenite::protocol::Message as WsMessage;

use crate::queue::{Message, QueueId};
use crate::utils::error::ProtocolError;

/// Commands a client sends over its WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Subscribe { queue_id: QueueId },
    Unsubscribe { queue_id: QueueId },
}

impl ClientMessage {
    /// Decode one inbound frame. Control frames carry no command and yield
    /// `None`; binary frames and malformed text are protocol violations.
    pub fn decode(frame: &WsMessage) -> Result<Option<Self>, ProtocolError> {
        match frame {
            WsMessage::Text(text) => Ok(Some(serde_json::from_str(text)?)),
            WsMessage::Binary(data) => Err(ProtocolError::BinaryFrame(data.len())),
            _ => Ok(None),
        }
    }

    pub fn to_frame(&self) -> Result<WsMessage, serde_json::Error> {
        Ok(WsMessage::text(serde_json::to_string(self)?))
    }
}

/// Events pushed from the server to a client.
///
/// `InitialMessages` is the first batch after a subscribe and tells the
/// client to replace its view; `Messages` is merged into it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    InitialMessages {
        queue_id: QueueId,
        messages: Vec<Message>,
    },
    Messages {
        queue_id: QueueId,
        messages: Vec<Message>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn queue_id(&self) -> Option<&str> {
        match self {
            Self::InitialMessages { queue_id, .. } | Self::Messages { queue_id, .. } => {
                Some(queue_id)
            }
            Self::Error { .. } => None,
        }
    }

    pub fn to_frame(&self) -> Result<WsMessage, serde_json::Error> {
        Ok(WsMessage::text(serde_json::to_string(self)?))
    }
}
