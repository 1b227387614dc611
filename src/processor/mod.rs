//! Request processing between the transport and the commands.

mod command_processor;

pub use command_processor::CommandProcessor;
