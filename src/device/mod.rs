//! Device collection used by commands that touch live hardware state.
//!
//! Devices are simulated from the `[[devices]]` configuration section.

mod collector;

pub use collector::{DataCollector, DeviceKind, RecordingState, RecordingSummary, TrackedFrame};
