//! The `utils` module provides the pieces shared across `queuescope`:
//! the error types of every layer and the logging bootstrap.

pub mod error;
pub mod logging;
