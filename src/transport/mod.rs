//! The `transport` module is responsible for the network side of live
//! tailing: the JSON protocol spoken over WebSockets, the per-connection
//! session, and the accept loop.

pub mod message;
pub mod session;
pub mod websocket;


pub use message::{ClientMessage, ServerMessage};
pub use session::{CloseReason, KeepAlive, Session, SessionOutcome, SessionState};
pub use websocket::{serve, start_websocket_server};
