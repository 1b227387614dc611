//! devctl daemon library
//!
//! Core of a remote command server for tracking and imaging devices. Clients
//! send named commands over TCP; each request becomes an independent command
//! instance that runs against the shared device and transform state and
//! answers with exactly one reply on the device's reply channel.

pub mod commands;
pub mod config;
pub mod config_tree;
pub mod device;
pub mod error;
pub mod processor;
pub mod protocol;
pub mod server;
pub mod transform;
