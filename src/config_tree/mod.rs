//! Configuration tree used to carry command parameters.
//!
//! The tree is format-agnostic: commands only look up attributes by name and
//! children by tag. On the wire it travels as JSON.

mod element;

pub use element::{format_bool, format_vector, ConfigElement};
