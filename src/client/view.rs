//! Ordered message view
//!
//! `MessageView` holds the messages of one queue, newest first by their
//! `SentTimestamp` attribute. Identifiers are unique within the view; a batch
//! that repeats a known id leaves the existing entry alone. Equal timestamps
//! keep insertion order, and a message without a usable timestamp sorts as
//! the oldest possible one.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::queue::Message;

#[derive(Debug, Clone)]
struct Entry {
    sent_time: i64,
    message: Message,
}

impl Entry {
    fn new(message: Message) -> Self {
        Self {
            sent_time: message.sent_time().unwrap_or(i64::MIN),
            message,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageView {
    entries: Vec<Entry>,
    ids: HashSet<String>,
}

impl MessageView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and install `batch` as the whole view.
    pub fn replace(&mut self, batch: Vec<Message>) -> usize {
        self.entries.clear();
        self.ids.clear();
        self.merge(batch)
    }

    /// Fold in older messages fetched by pagination.
    pub fn append(&mut self, batch: Vec<Message>) -> usize {
        self.merge(batch)
    }

    /// Fold in newly arrived messages.
    pub fn prepend(&mut self, batch: Vec<Message>) -> usize {
        self.merge(batch)
    }

    /// Add every message whose id is not present yet and restore the order.
    /// Returns how many messages were added.
    pub fn merge(&mut self, batch: Vec<Message>) -> usize {
        let before = self.entries.len();
        for message in batch {
            if self.ids.insert(message.message_id.clone()) {
                self.entries.push(Entry::new(message));
            }
        }

        let added = self.entries.len() - before;
        if added > 0 {
            // stable: ties stay in insertion order
            self.entries.sort_by_key(|entry| Reverse(entry.sent_time));
        }
        added
    }

    pub fn ordered_messages(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    /// Message ids in display order.
    pub fn ids(&self) -> Vec<&str> {
        self.iter().map(|m| m.message_id.as_str()).collect()
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.ids.contains(message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
