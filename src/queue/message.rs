//! Message definitions for the queue service
//!
//! `Message` is what the queue service hands out on fetch and what travels
//! to clients inside push events. It is never mutated after it is received;
//! the registry and the merge engine only move or drop copies of it.
//!
//! Notes on fields:
//! - `message_id`: assigned by the service, unique within a queue at a given time
//! - `body`: opaque payload, usually JSON text
//! - `attributes`: string key/value pairs; `SentTimestamp` holds the sender's
//!   send time in milliseconds since the UNIX epoch
//! - `receipt_handle`: delivery token required to delete the message

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute holding the sender-assigned send time (epoch milliseconds).
pub const SENT_TIMESTAMP: &str = "SentTimestamp";

/// Attribute holding how many times the message has been received.
pub const RECEIVE_COUNT: &str = "ApproximateReceiveCount";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub receipt_handle: String,
}

impl Message {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
            attributes: BTreeMap::new(),
            receipt_handle: String::new(),
        }
    }

    pub fn with_sent_time(mut self, millis: i64) -> Self {
        self.attributes
            .insert(SENT_TIMESTAMP.to_string(), millis.to_string());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The `SentTimestamp` attribute, or `None` when it is absent or not an integer.
    pub fn sent_time(&self) -> Option<i64> {
        self.attributes.get(SENT_TIMESTAMP)?.trim().parse().ok()
    }
}
