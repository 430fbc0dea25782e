use std::time::Duration;

use async_trait::async_trait;

use crate::queue::{Message, QueueId};
use crate::utils::error::QueueError;

/// Capability surface of the backing queue service.
///
/// The live-tailing core only ever calls [`QueueService::fetch_messages`];
/// the other operations exist for the tools built around it.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Identifiers of every queue the service knows about.
    async fn list_queues(&self) -> Result<Vec<QueueId>, QueueError>;

    /// Fetch up to `max_count` available messages, waiting at most `wait`
    /// on the service side when none are available right away.
    async fn fetch_messages(
        &self,
        queue_id: &str,
        max_count: usize,
        wait: Duration,
    ) -> Result<Vec<Message>, QueueError>;

    /// Enqueue `body` and return the new message id.
    async fn send(&self, queue_id: &str, body: &str) -> Result<String, QueueError>;

    /// Remove the message that was delivered with `receipt_handle`.
    async fn delete(&self, queue_id: &str, receipt_handle: &str) -> Result<(), QueueError>;
}
