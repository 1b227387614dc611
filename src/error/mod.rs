//! Error types for the command daemon.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
