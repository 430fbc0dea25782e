//! Live tail client
//!
//! Connects to a queuescope server, subscribes to one queue and feeds every
//! push into a spawned `MergeEngine`. Rendering is left to the caller, which
//! can watch the engine's revisions.

use std::error::Error;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info};

use crate::client::engine::EngineHandle;
use crate::queue::Message;
use crate::transport::message::ClientMessage;

/// Stream pushes for `queue_id` from `url` into `engine` until the server
/// closes the connection. Returns the number of push frames received.
pub async fn run_tail(
    url: &str,
    queue_id: &str,
    engine: &EngineHandle,
) -> Result<u64, Box<dyn Error + Send + Sync>> {
    let (mut ws_stream, _response) = connect_async(url).await?;
    info!(url, queue = queue_id, "connected");

    engine.select_queue(queue_id)?;
    let subscribe = ClientMessage::Subscribe {
        queue_id: queue_id.to_string(),
    };
    ws_stream.send(subscribe.to_frame()?).await?;

    let mut received = 0u64;
    while let Some(frame) = ws_stream.next().await {
        match frame? {
            WsMessage::Text(text) => {
                engine.push_text(text.as_str())?;
                received += 1;
            }
            WsMessage::Close(frame) => {
                debug!(?frame, "server closed the connection");
                break;
            }
            _ => {}
        }
    }

    Ok(received)
}

/// One line per message, newest first.
pub fn render(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let sent = message
            .sent_time()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{sent}  {}  {}\n", message.message_id, message.body));
    }
    out
}
