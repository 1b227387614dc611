//! Acquisition commands module.
//!
//! Commands that pull frames from devices or drive capture recordings.

mod acquire;
mod recording;

pub use acquire::AcquireCommand;
pub use recording::RecordingCommand;
