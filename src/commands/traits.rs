//! Command trait definition.

use std::fmt;

use crate::config_tree::ConfigElement;
use crate::error::{ServerError, ValidationErrorKind};
use crate::protocol::ClientId;

use super::types::{CommandBase, ExecutionContext};

/// Core trait for all remotely invokable commands.
///
/// A variant may answer to several names (see [`Command::command_names`]).
/// The registry keeps one prototype per variant and hands out clones, so a
/// request never mutates the prototype.
///
/// # Lifecycle
///
/// Created (clone) → configured (`read_configuration`) → executing
/// (`execute`, possibly several ticks) → completed (the variant or the
/// processor ran [`CommandBase::complete`]).
///
/// Calling `execute` again before completion continues the pending
/// operation. Calling it after completion does nothing.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Default)]
/// pub struct MyCommand {
///     base: CommandBase,
/// }
///
/// impl Command for MyCommand {
///     fn base(&self) -> &CommandBase { &self.base }
///     fn base_mut(&mut self) -> &mut CommandBase { &mut self.base }
///     fn clone_box(&self) -> Box<dyn Command> { Box::new(self.clone()) }
///     fn command_names(&self) -> &'static [&'static str] { &["MyCommand"] }
///     fn description(&self, name: Option<&str>) -> String {
///         describe_commands(&[("MyCommand", "Does the thing.")], name)
///     }
///     fn execute(&mut self, ctx: &ExecutionContext) -> Result<(), ServerError> {
///         self.validate_name()?;
///         self.base.complete(ctx, ReplyStatus::Success, "done")
///     }
/// }
/// ```
pub trait Command: Send + Sync {
    /// Shared identity and completion state.
    fn base(&self) -> &CommandBase;

    fn base_mut(&mut self) -> &mut CommandBase;

    /// Independent copy of this command, including its current parameters.
    fn clone_box(&self) -> Box<dyn Command>;

    /// The names this variant answers to. Never changes for a variant.
    fn command_names(&self) -> &'static [&'static str];

    /// Description of one supported command, or of all of them for `None`.
    fn description(&self, command_name: Option<&str>) -> String;

    /// Run (or continue) the command against the collaborators in `ctx`.
    ///
    /// A returned error is turned into a failure reply by the processor.
    fn execute(&mut self, ctx: &ExecutionContext) -> Result<(), ServerError>;

    /// Load parameters from a configuration element.
    ///
    /// Variants with parameters read the base first, check the name with
    /// [`Command::validate_name`], then read their own attributes. A missing or
    /// foreign name fails here, before anything executes.
    fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        self.base_mut().read_configuration(config)?;
        self.validate_name()
    }

    /// Store parameters into a configuration element.
    fn write_configuration(&self, config: &mut ConfigElement) -> Result<(), ServerError> {
        self.base().write_configuration(config);
        Ok(())
    }

    /// Whether no further `execute` calls are needed.
    ///
    /// Most commands finish within one `execute` call. Long-running variants
    /// report `false` until the underlying operation finished.
    fn is_completed(&self) -> bool {
        true
    }

    /// Check that the current name is one this variant supports.
    fn validate_name(&self) -> Result<(), ServerError> {
        let name = self.base().name().ok_or(ServerError::Validation {
            kind: ValidationErrorKind::CommandNameNotSet,
        })?;

        let supported = self.command_names();
        if supported.contains(&name) {
            Ok(())
        } else {
            Err(ServerError::Validation {
                kind: ValidationErrorKind::UnsupportedCommandName {
                    name: name.to_string(),
                    supported: supported.join(", "),
                },
            })
        }
    }

    fn name(&self) -> Option<&str> {
        self.base().name()
    }

    fn id(&self) -> Option<&str> {
        self.base().id()
    }

    fn device_name(&self) -> &str {
        self.base().device_name()
    }

    fn client_id(&self) -> ClientId {
        self.base().client_id()
    }

    fn reply_device_name(&self) -> String {
        self.base().reply_device_name()
    }
}

impl Clone for Box<dyn Command> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("device_name", &self.device_name())
            .field("client_id", &self.client_id())
            .field("completed", &self.base().is_completed())
            .finish()
    }
}
