//! The `registry` module is the server-side half of live tailing.
//!
//! `SubscriptionRegistry` tracks which connection watches which queue and
//! runs one `PollTask` per (connection, queue) pair. Sessions register on
//! accept, subscribe on command and unregister on teardown; poll tasks push
//! batches into the owning session's channel.

pub mod connection;
pub mod poller;
pub mod subscriptions;

pub use connection::{Connection, ConnectionId};
pub use poller::PollSchedule;
pub use subscriptions::SubscriptionRegistry;
