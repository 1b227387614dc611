//! Command handlers module.
//!
//! Contains the command trait, the registry and all command implementations.
//!
//! ## Adding a New Command
//!
//! 1. Create a new file in the appropriate subdirectory (e.g., `system/`, `transform/`)
//! 2. Implement the `Command` trait, embedding a `CommandBase`
//! 3. Register a prototype in `CommandRegistry::new()`

mod registry;
mod traits;
mod types;

pub mod acquisition;
pub mod system;
pub mod transform;

pub use registry::CommandRegistry;
pub use traits::Command;
pub use types::{describe_commands, CommandBase, ExecutionContext, ReplySink};
