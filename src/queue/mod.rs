//! The `queue` module is the boundary to the backing queue service.
//!
//! It defines the `QueueService` capability the poll tasks call, the
//! `Message` type that flows through the system, and a deterministic
//! in-memory implementation with an optional synthetic feed.

pub mod demo;
pub mod memory;
pub mod message;
pub mod service;

pub use memory::InMemoryQueueService;
pub use message::Message;
pub use service::QueueService;

/// Opaque queue address (a name or URL).
pub type QueueId = String;
