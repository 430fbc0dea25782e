//! The `error` module defines the error types used within `queuescope`.
//!
//! Each layer gets its own enum so callers can tell a transient upstream
//! failure apart from a protocol violation or a rejected client push.

use thiserror::Error;

/// Errors returned by a queue service implementation.
///
/// Every variant is treated as transient by the poll loop: it is logged and
/// the next tick tries again.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("receipt handle is not valid for queue {queue}: {receipt_handle}")]
    InvalidReceiptHandle {
        queue: String,
        receipt_handle: String,
    },

    #[error("queue service unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the subscription registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is not registered")]
    UnknownConnection(String),

    #[error("poll tasks need a Tokio runtime, none is running on this thread")]
    NoRuntime,
}

/// An inbound frame that cannot be turned into a command.
///
/// A session that sees one of these closes; the stream cannot be resynchronized.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed command: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected binary frame ({0} bytes)")]
    BinaryFrame(usize),
}

/// A push the client-side merge engine refused to apply.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("malformed push payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message at position {0} has an empty id")]
    MissingMessageId(usize),

    #[error("message engine has shut down")]
    EngineClosed,
}
