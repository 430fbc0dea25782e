//! Subscription registry
//!
//! This module owns the table of live subscriptions and the lifecycle of the
//! poll tasks behind them:
//! - each registered connection maps to the queues it watches
//! - each (connection, queue) pair has exactly one poll task, identified by a
//!   generation number and stopped through its cancellation token
//! - re-subscribing cancels the old task before the new one is spawned
//! - unregistering cancels every task of the connection in one critical section
//!
//! Concurrency notes:
//! - One mutex guards the whole nested map. Every critical section is map
//!   bookkeeping or a non-blocking channel send; queue-service calls happen in
//!   the poll tasks, outside the lock.
//! - Deliveries are checked against the current generation under the same
//!   lock, so a superseded task can never push after its replacement started.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue::{QueueId, QueueService};
use crate::registry::connection::{Connection, ConnectionId};
use crate::registry::poller::{PollSchedule, PollTask, RunningGuard};
use crate::transport::message::ServerMessage;
use crate::utils::error::RegistryError;

#[derive(Debug)]
struct Subscription {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug)]
struct ConnectionEntry {
    sender: UnboundedSender<ServerMessage>,
    subscriptions: HashMap<QueueId, Subscription>,
}

/// Outcome of handing a batch to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// The task's generation is no longer the live one for its pair.
    Superseded,
    /// The session stopped reading its push channel.
    Disconnected,
}

/// The lock-guarded table shared between the registry and its poll tasks.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionTable {
    connections: Mutex<HashMap<ConnectionId, ConnectionEntry>>,
}

impl SubscriptionTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionEntry>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn deliver(
        &self,
        connection_id: &str,
        queue_id: &str,
        generation: u64,
        push: ServerMessage,
    ) -> Delivery {
        let connections = self.lock();
        let Some(entry) = connections.get(connection_id) else {
            return Delivery::Superseded;
        };
        match entry.subscriptions.get(queue_id) {
            Some(live) if live.generation == generation && !live.token.is_cancelled() => {}
            _ => return Delivery::Superseded,
        }
        match entry.sender.send(push) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Disconnected,
        }
    }
}

pub struct SubscriptionRegistry {
    table: Arc<SubscriptionTable>,
    service: Arc<dyn QueueService>,
    schedule: PollSchedule,
    generations: AtomicU64,
    running: Arc<AtomicUsize>,
    root: CancellationToken,
}

impl SubscriptionRegistry {
    pub fn new(service: Arc<dyn QueueService>, schedule: PollSchedule) -> Self {
        Self {
            table: Arc::new(SubscriptionTable::default()),
            service,
            schedule,
            generations: AtomicU64::new(0),
            running: Arc::new(AtomicUsize::new(0)),
            root: CancellationToken::new(),
        }
    }

    /// Add a connection with no subscriptions.
    ///
    /// Registering the same id twice is a bug in the caller: it panics in
    /// debug builds and is ignored otherwise.
    pub fn register(&self, connection: Connection) {
        let mut connections = self.table.lock();
        let duplicate = connections.contains_key(&connection.id);
        debug_assert!(!duplicate, "connection {} registered twice", connection.id);
        if duplicate {
            warn!(connection = %connection.id, "duplicate registration ignored");
            return;
        }
        debug!(connection = %connection.id, "connection registered");
        connections.insert(
            connection.id,
            ConnectionEntry {
                sender: connection.sender,
                subscriptions: HashMap::new(),
            },
        );
    }

    /// Start live polling of `queue_id` for `connection_id`, replacing any
    /// poll task already running for the pair. Returns the new task's generation.
    ///
    /// The task is spawned on the calling thread's Tokio runtime; without one
    /// the call fails with `RegistryError::NoRuntime` and changes nothing.
    pub fn subscribe(&self, connection_id: &str, queue_id: &str) -> Result<u64, RegistryError> {
        let runtime = Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let token = self.root.child_token();

        {
            let mut connections = self.table.lock();
            let entry = connections
                .get_mut(connection_id)
                .ok_or_else(|| RegistryError::UnknownConnection(connection_id.to_string()))?;

            let replaced = entry.subscriptions.insert(
                queue_id.to_string(),
                Subscription {
                    generation,
                    token: token.clone(),
                },
            );
            if let Some(previous) = replaced {
                previous.token.cancel();
                debug!(
                    connection = %connection_id,
                    queue = %queue_id,
                    generation = previous.generation,
                    "previous poll task cancelled"
                );
            }
        }

        let task = PollTask {
            connection_id: connection_id.to_string(),
            queue_id: queue_id.to_string(),
            generation,
            token,
            service: self.service.clone(),
            schedule: self.schedule.clone(),
            table: self.table.clone(),
            _running: RunningGuard::new(self.running.clone()),
        };
        runtime.spawn(task.run());

        info!(connection = %connection_id, queue = %queue_id, generation, "subscribed");
        Ok(generation)
    }

    /// Stop polling one queue for a connection. Returns whether a
    /// subscription existed.
    pub fn unsubscribe(&self, connection_id: &str, queue_id: &str) -> bool {
        let removed = self
            .table
            .lock()
            .get_mut(connection_id)
            .and_then(|entry| entry.subscriptions.remove(queue_id));

        match removed {
            Some(subscription) => {
                subscription.token.cancel();
                info!(connection = %connection_id, queue = %queue_id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Cancel every poll task of `connection_id` and forget the connection.
    /// Calling it again is a no-op. Returns how many tasks were cancelled.
    pub fn unregister(&self, connection_id: &str) -> usize {
        let Some(entry) = self.table.lock().remove(connection_id) else {
            return 0;
        };

        let cancelled = entry.subscriptions.len();
        for subscription in entry.subscriptions.values() {
            subscription.token.cancel();
        }
        info!(connection = %connection_id, cancelled, "connection unregistered");
        cancelled
    }

    /// Cancel every poll task and drop every connection. Sessions notice
    /// through their closed push channels.
    pub fn shutdown(&self) {
        self.root.cancel();
        let dropped = {
            let mut connections = self.table.lock();
            let dropped = connections.len();
            connections.clear();
            dropped
        };
        info!(connections = dropped, "subscription registry shut down");
    }

    pub fn connection_count(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_registered(&self, connection_id: &str) -> bool {
        self.table.lock().contains_key(connection_id)
    }

    /// Queues `connection_id` currently watches, sorted.
    pub fn subscriptions(&self, connection_id: &str) -> Vec<QueueId> {
        let mut queues: Vec<QueueId> = self
            .table
            .lock()
            .get(connection_id)
            .map(|entry| entry.subscriptions.keys().cloned().collect())
            .unwrap_or_default();
        queues.sort();
        queues
    }

    /// Subscriptions whose task has not been cancelled.
    pub fn live_subscription_count(&self) -> usize {
        self.table
            .lock()
            .values()
            .flat_map(|entry| entry.subscriptions.values())
            .filter(|subscription| !subscription.token.is_cancelled())
            .count()
    }

    /// Poll tasks that have not exited yet, cancelled or not.
    pub fn running_tasks(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &SubscriptionTable {
        &self.table
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
