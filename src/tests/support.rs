//! Helpers shared by the test modules.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::queue::{Message, QueueId, QueueService};
use crate::registry::PollSchedule;
use crate::utils::error::QueueError;

pub(crate) type FetchResult = Result<Vec<Message>, QueueError>;

/// Queue service that plays back scripted fetch results per queue and
/// counts every call. An exhausted script yields empty batches.
#[derive(Default)]
pub(crate) struct ScriptedService {
    scripts: Mutex<HashMap<QueueId, VecDeque<FetchResult>>>,
    calls: Mutex<HashMap<QueueId, usize>>,
    delay: Duration,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps this long before answering.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn script(&self, queue_id: &str, results: Vec<FetchResult>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(queue_id.to_string())
            .or_default()
            .extend(results);
    }

    pub(crate) fn calls(&self, queue_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(queue_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl QueueService for ScriptedService {
    async fn list_queues(&self) -> Result<Vec<QueueId>, QueueError> {
        Ok(self.scripts.lock().unwrap().keys().cloned().collect())
    }

    async fn fetch_messages(
        &self,
        queue_id: &str,
        max_count: usize,
        _wait: Duration,
    ) -> Result<Vec<Message>, QueueError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(queue_id.to_string())
            .or_default() += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(queue_id)
            .and_then(|script| script.pop_front());
        match next {
            Some(Ok(mut batch)) => {
                batch.truncate(max_count);
                Ok(batch)
            }
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    async fn send(&self, queue_id: &str, _body: &str) -> Result<String, QueueError> {
        Err(QueueError::Unavailable(format!("{queue_id} is read-only")))
    }

    async fn delete(&self, queue_id: &str, _receipt_handle: &str) -> Result<(), QueueError> {
        Err(QueueError::Unavailable(format!("{queue_id} is read-only")))
    }
}

/// A schedule fast enough for tests.
pub(crate) fn fast_schedule() -> PollSchedule {
    PollSchedule {
        interval: Duration::from_millis(20),
        max_messages: 10,
        wait_time: Duration::ZERO,
    }
}

pub(crate) fn message(id: &str, sent: i64) -> Message {
    Message::new(id, format!("body-{id}")).with_sent_time(sent)
}

/// Poll `condition` until it holds or two seconds pass.
pub(crate) async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Await `future` for at most two seconds.
pub(crate) async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}
