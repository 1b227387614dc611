//! System commands module.
//!
//! Contains connectivity checks and device/channel discovery.

mod echo;
mod request_ids;

pub use echo::EchoCommand;
pub use request_ids::RequestIdsCommand;
