//! Wire protocol module.
//!
//! Defines the request/reply types and message framing for client connections.
//!
//! ## Wire Format
//!
//! Messages are length-prefixed JSON:
//! ```text
//! [4 bytes: length (big-endian u32)][JSON payload]
//! ```

mod reply;
mod request;
mod wire;

pub use reply::{reply_device_name, ClientId, Reply, ReplyStatus, REPLY_DEVICE_SUFFIX};
pub use request::{CommandRequest, DEVICE_NAME_ATTRIBUTE, ID_ATTRIBUTE, NAME_ATTRIBUTE};
pub use wire::{read_frame, read_json, write_frame, write_json, DEFAULT_MAX_MESSAGE_SIZE};
