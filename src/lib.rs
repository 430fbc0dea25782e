//! # queuescope
//!
//! `queuescope` is the live-tailing core of a queue debugging console. A
//! server polls a queue service on behalf of WebSocket clients and pushes
//! what it finds; clients merge those pushes into a deduplicated,
//! newest-first view.
//!
//! ## Core Modules
//!
//! - `queue`: The queue-service boundary, the `Message` type and an in-memory service.
//! - `registry`: Subscription registry and the per-subscription poll tasks.
//! - `transport`: The JSON protocol, connection sessions and the WebSocket accept loop.
//! - `client`: The merge engine and a terminal tail client built on it.
//! - `config`: Loading layered server settings.
//! - `utils`: Error types and logging setup.

pub mod client;
pub mod config;
pub mod queue;
pub mod registry;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
