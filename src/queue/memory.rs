//! In-memory queue service
//!
//! A deterministic stand-in for the managed queue service, used by the
//! server binary and by tests:
//! - per-queue FIFO of ready messages
//! - fetched messages become invisible for a visibility timeout and come
//!   back if they are not deleted in time
//! - fetches long-poll: with nothing ready they wait up to the requested
//!   duration for a send
//! - message ids and receipt handles come from counters, so runs are
//!   reproducible

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::queue::message::{Message, RECEIVE_COUNT, SENT_TIMESTAMP};
use crate::queue::{QueueId, QueueService};
use crate::utils::error::QueueError;

#[derive(Debug, Clone)]
struct StoredMessage {
    seq: u64,
    message_id: String,
    body: String,
    attributes: BTreeMap<String, String>,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: StoredMessage,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct MemoryQueue {
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<String, InFlight>,
}

impl MemoryQueue {
    /// Move messages whose visibility timeout lapsed back to `ready`,
    /// keeping send order.
    fn restore_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        if expired.is_empty() {
            return;
        }

        for handle in expired {
            if let Some(flight) = self.in_flight.remove(&handle) {
                self.ready.push_back(flight.message);
            }
        }
        self.ready.make_contiguous().sort_by_key(|m| m.seq);
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    queues: BTreeMap<QueueId, MemoryQueue>,
    next_seq: u64,
}

#[derive(Debug)]
pub struct InMemoryQueueService {
    state: Mutex<MemoryState>,
    arrivals: Notify,
    visibility_timeout: Duration,
}

impl InMemoryQueueService {
    pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            arrivals: Notify::new(),
            visibility_timeout,
        }
    }

    /// Service pre-populated with empty queues.
    pub fn with_queues<I, S>(queues: I, visibility_timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<QueueId>,
    {
        let service = Self::new(visibility_timeout);
        for queue in queues {
            service.create_queue(queue);
        }
        service
    }

    /// Create `queue_id` if it does not exist yet.
    pub fn create_queue(&self, queue_id: impl Into<QueueId>) {
        self.lock().queues.entry(queue_id.into()).or_default();
    }

    /// Enqueue a message carrying an explicit send time (epoch milliseconds).
    pub fn enqueue(&self, queue_id: &str, body: &str, sent_at: i64) -> Result<String, QueueError> {
        let message_id = {
            let mut state = self.lock();
            state.next_seq += 1;
            let seq = state.next_seq;
            let queue = state
                .queues
                .get_mut(queue_id)
                .ok_or_else(|| QueueError::QueueNotFound(queue_id.to_string()))?;

            let message_id = format!("msg-{seq:06}");
            let mut attributes = BTreeMap::new();
            attributes.insert(SENT_TIMESTAMP.to_string(), sent_at.to_string());
            queue.ready.push_back(StoredMessage {
                seq,
                message_id: message_id.clone(),
                body: body.to_string(),
                attributes,
                receive_count: 0,
            });
            message_id
        };

        self.arrivals.notify_waiters();
        debug!(queue = %queue_id, message = %message_id, "message enqueued");
        Ok(message_id)
    }

    /// Number of messages currently waiting to be fetched.
    pub fn ready_count(&self, queue_id: &str) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        match state.queues.get_mut(queue_id) {
            Some(queue) => {
                queue.restore_expired(now);
                queue.ready.len()
            }
            None => 0,
        }
    }

    fn take_visible(&self, queue_id: &str, max_count: usize) -> Result<Vec<Message>, QueueError> {
        let now = Instant::now();
        let visible_at = now + self.visibility_timeout;
        let mut state = self.lock();
        let queue = state
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| QueueError::QueueNotFound(queue_id.to_string()))?;

        queue.restore_expired(now);

        let take = max_count.min(queue.ready.len());
        let mut batch = Vec::with_capacity(take);
        for mut stored in queue.ready.drain(..take).collect::<Vec<_>>() {
            stored.receive_count += 1;
            let receipt_handle = format!("{}#{}", stored.message_id, stored.receive_count);

            let mut attributes = stored.attributes.clone();
            attributes.insert(RECEIVE_COUNT.to_string(), stored.receive_count.to_string());
            batch.push(Message {
                message_id: stored.message_id.clone(),
                body: stored.body.clone(),
                attributes,
                receipt_handle: receipt_handle.clone(),
            });

            queue.in_flight.insert(
                receipt_handle,
                InFlight {
                    message: stored,
                    visible_at,
                },
            );
        }
        Ok(batch)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryQueueService {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VISIBILITY_TIMEOUT)
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn list_queues(&self) -> Result<Vec<QueueId>, QueueError> {
        Ok(self.lock().queues.keys().cloned().collect())
    }

    async fn fetch_messages(
        &self,
        queue_id: &str,
        max_count: usize,
        wait: Duration,
    ) -> Result<Vec<Message>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            // Register interest before looking, so a send in between still wakes us.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let batch = self.take_visible(queue_id, max_count)?;
            if !batch.is_empty() || max_count == 0 {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, arrival).await.is_err() {
                return Ok(batch);
            }
        }
    }

    async fn send(&self, queue_id: &str, body: &str) -> Result<String, QueueError> {
        self.enqueue(queue_id, body, chrono::Utc::now().timestamp_millis())
    }

    async fn delete(&self, queue_id: &str, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.lock();
        let queue = state
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| QueueError::QueueNotFound(queue_id.to_string()))?;

        match queue.in_flight.remove(receipt_handle) {
            Some(_) => Ok(()),
            None => Err(QueueError::InvalidReceiptHandle {
                queue: queue_id.to_string(),
                receipt_handle: receipt_handle.to_string(),
            }),
        }
    }
}
