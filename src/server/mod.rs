//! TCP command server.
//!
//! Accepts client connections, feeds their requests to the processor and
//! routes replies back to the connection that sent the request.

mod connection;
mod listener;
mod router;

pub use connection::handle_connection;
pub use listener::{ConnectionMetrics, ServerListener};
pub use router::ReplyRouter;
