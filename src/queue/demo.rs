//! Synthetic message feed for the in-memory service.
//!
//! Publishes one small JSON event per tick, cycling through the given queues,
//! until its token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue::{QueueId, QueueService};

const EVENT_KINDS: [&str; 4] = ["created", "updated", "shipped", "cancelled"];

pub fn spawn_demo_feed(
    service: Arc<dyn QueueService>,
    queues: Vec<QueueId>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        if queues.is_empty() {
            warn!("demo feed has no queues to publish to");
            return 0;
        }
        info!(queues = queues.len(), "demo feed started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut sent = 0u64;
        let mut ticks = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // indexed by tick so a failing queue does not hold the rotation
            let queue = &queues[ticks % queues.len()];
            ticks += 1;
            let body = json!({
                "event": EVENT_KINDS[(sent as usize) % EVENT_KINDS.len()],
                "sequence": sent,
            })
            .to_string();

            match service.send(queue, &body).await {
                Ok(message_id) => {
                    debug!(queue = %queue, message = %message_id, "demo message sent");
                    sent += 1;
                }
                Err(e) => warn!(queue = %queue, error = %e, "demo send failed"),
            }
        }

        info!(sent, "demo feed stopped");
        sent
    })
}
