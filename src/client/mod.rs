//! The `client` module is the consuming half of live tailing.
//!
//! `MessageView` keeps one queue's messages deduplicated and newest first,
//! `MergeEngine` decides how each push changes it, and `tail` connects the
//! engine to a running server.

pub mod engine;
pub mod tail;
pub mod view;

pub use engine::{EngineHandle, MergeEngine, PushOutcome, spawn_engine};
pub use view::MessageView;

#[cfg(test)]
mod tests;
