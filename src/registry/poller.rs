//! Poll task
//!
//! One task per (connection, queue). It fetches once right away and sends
//! the result as the `initial_messages` snapshot, then fetches on every tick
//! and pushes non-empty batches as `messages`. It keeps no state about what
//! it has seen: the queue service decides what is available.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PollerSettings;
use crate::queue::{Message, QueueService};
use crate::registry::subscriptions::{Delivery, SubscriptionTable};
use crate::transport::message::ServerMessage;

/// Timing and batch size of a poll task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_messages: usize,
    pub wait_time: Duration,
}

impl From<&PollerSettings> for PollSchedule {
    fn from(settings: &PollerSettings) -> Self {
        Self {
            interval: settings.interval(),
            max_messages: settings.batch_size(),
            wait_time: settings.wait_time(),
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_messages: 10,
            wait_time: Duration::from_secs(1),
        }
    }
}

/// Counts a task as running for as long as it is alive.
#[derive(Debug)]
pub(crate) struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    pub(crate) fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct PollTask {
    pub(crate) connection_id: String,
    pub(crate) queue_id: String,
    pub(crate) generation: u64,
    pub(crate) token: CancellationToken,
    pub(crate) service: Arc<dyn QueueService>,
    pub(crate) schedule: PollSchedule,
    pub(crate) table: Arc<SubscriptionTable>,
    pub(crate) _running: RunningGuard,
}

impl PollTask {
    pub(crate) async fn run(self) {
        debug!(
            connection = %self.connection_id,
            queue = %self.queue_id,
            generation = self.generation,
            "poll task started"
        );

        // The first tick completes immediately and produces the snapshot.
        let period = self.schedule.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut snapshot_pending = true;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                result = self.service.fetch_messages(
                    &self.queue_id,
                    self.schedule.max_messages,
                    self.schedule.wait_time,
                ) => result,
            };

            let messages = match fetched {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(
                        connection = %self.connection_id,
                        queue = %self.queue_id,
                        error = %e,
                        "fetch failed, retrying next tick"
                    );
                    continue;
                }
            };

            if !snapshot_pending && messages.is_empty() {
                continue;
            }

            let push = self.push(messages, snapshot_pending);
            snapshot_pending = false;

            match self.table.deliver(
                &self.connection_id,
                &self.queue_id,
                self.generation,
                push,
            ) {
                Delivery::Delivered => {}
                Delivery::Superseded => break,
                Delivery::Disconnected => {
                    debug!(
                        connection = %self.connection_id,
                        queue = %self.queue_id,
                        "push channel closed, waiting for teardown"
                    );
                }
            }
        }

        debug!(
            connection = %self.connection_id,
            queue = %self.queue_id,
            generation = self.generation,
            "poll task stopped"
        );
    }

    fn push(&self, messages: Vec<Message>, snapshot: bool) -> ServerMessage {
        let queue_id = self.queue_id.clone();
        if snapshot {
            ServerMessage::InitialMessages { queue_id, messages }
        } else {
            ServerMessage::Messages { queue_id, messages }
        }
    }
}
