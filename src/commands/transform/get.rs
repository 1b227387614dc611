//! Transform lookup.

use crate::config_tree::{format_vector, ConfigElement};
use crate::error::ServerError;
use crate::protocol::ReplyStatus;
use crate::transform::TransformName;

use super::super::traits::Command;
use super::super::types::{describe_commands, CommandBase, ExecutionContext};
use super::read_transform_name;

const GET_TRANSFORM: &str = "GetTransform";

/// Replies with the 16 row-major values of a stored transform.
#[derive(Debug, Clone, Default)]
pub struct GetTransformCommand {
    base: CommandBase,
    transform_name: Option<TransformName>,
}

impl GetTransformCommand {
    pub fn transform_name(&self) -> Option<&TransformName> {
        self.transform_name.as_ref()
    }
}

impl Command for GetTransformCommand {
    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn clone_box(&self) -> Box<dyn Command> {
        Box::new(self.clone())
    }

    fn command_names(&self) -> &'static [&'static str] {
        &[GET_TRANSFORM]
    }

    fn description(&self, command_name: Option<&str>) -> String {
        describe_commands(
            &[(
                GET_TRANSFORM,
                "Reply with the matrix of TransformName (e.g. ProbeToTracker).",
            )],
            command_name,
        )
    }

    fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        self.base.read_configuration(config)?;
        self.validate_name()?;
        self.transform_name = Some(read_transform_name(config)?);
        Ok(())
    }

    fn write_configuration(&self, config: &mut ConfigElement) -> Result<(), ServerError> {
        self.base.write_configuration(config);
        if let Some(name) = &self.transform_name {
            config.set_display_attribute("TransformName", name);
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &ExecutionContext) -> Result<(), ServerError> {
        if self.base.is_completed() {
            return Ok(());
        }
        self.validate_name()?;
        let name = self
            .transform_name
            .as_ref()
            .ok_or_else(|| ServerError::missing_parameter("TransformName"))?;

        let entry = ctx.transform_repository().get_transform(name)?;
        let message = format_vector(&entry.matrix);
        self.base.complete(ctx, ReplyStatus::Success, message)
    }
}
