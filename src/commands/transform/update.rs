//! Transform update.

use crate::config_tree::{format_bool, format_vector, ConfigElement};
use crate::error::ServerError;
use crate::protocol::ReplyStatus;
use crate::transform::{matrix_from_slice, Matrix4, TransformEntry, TransformName, IDENTITY};

use super::super::traits::Command;
use super::super::types::{describe_commands, CommandBase, ExecutionContext};
use super::read_transform_name;

const UPDATE_TRANSFORM: &str = "UpdateTransform";

/// Stores a transform and its calibration metadata.
#[derive(Debug, Clone)]
pub struct UpdateTransformCommand {
    base: CommandBase,
    transform_name: Option<TransformName>,
    matrix: Matrix4,
    persistent: bool,
    error: Option<f64>,
    date: Option<String>,
}

impl Default for UpdateTransformCommand {
    fn default() -> Self {
        Self {
            base: CommandBase::new(),
            transform_name: None,
            matrix: IDENTITY,
            persistent: true,
            error: None,
            date: None,
        }
    }
}

impl UpdateTransformCommand {
    pub fn transform_name(&self) -> Option<&TransformName> {
        self.transform_name.as_ref()
    }

    pub fn matrix(&self) -> &Matrix4 {
        &self.matrix
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    pub fn error(&self) -> Option<f64> {
        self.error
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

impl Command for UpdateTransformCommand {
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
        &[UPDATE_TRANSFORM]
    }

    fn description(&self, command_name: Option<&str>) -> String {
        describe_commands(
            &[(
                UPDATE_TRANSFORM,
                "Store TransformValue (16 row-major numbers) as TransformName, with optional \
                 TransformPersistent, TransformError and TransformDate.",
            )],
            command_name,
        )
    }

    fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        self.base.read_configuration(config)?;
        self.validate_name()?;
        self.transform_name = Some(read_transform_name(config)?);

        let values = config
            .vector_attribute("TransformValue")?
            .ok_or_else(|| ServerError::missing_parameter("TransformValue"))?;
        self.matrix = matrix_from_slice(&values).ok_or_else(|| {
            ServerError::invalid_parameter(
                "TransformValue",
                format!("expected 16 numbers, got {}", values.len()),
            )
        })?;

        self.persistent = config.bool_attribute("TransformPersistent")?.unwrap_or(true);
        self.error = config.parse_attribute::<f64>("TransformError")?;
        self.date = config.attribute("TransformDate").map(str::to_string);
        Ok(())
    }

    fn write_configuration(&self, config: &mut ConfigElement) -> Result<(), ServerError> {
        self.base.write_configuration(config);
        if let Some(name) = &self.transform_name {
            config.set_display_attribute("TransformName", name);
        }
        config.set_attribute("TransformValue", format_vector(&self.matrix));
        config.set_attribute("TransformPersistent", format_bool(self.persistent));
        if let Some(error) = self.error {
            config.set_display_attribute("TransformError", error);
        }
        if let Some(date) = &self.date {
            config.set_attribute("TransformDate", date.as_str());
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
            .clone()
            .ok_or_else(|| ServerError::missing_parameter("TransformName"))?;

        let entry = TransformEntry {
            matrix: self.matrix,
            persistent: self.persistent,
            error: self.error,
            date: self.date.clone(),
        };
        ctx.transform_repository().set_transform(&name, entry)?;

        self.base
            .complete(ctx, ReplyStatus::Success, format!("Transform {} updated", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::types::test_support::create_test_context;
    use crate::error::ValidationErrorKind;

    const MATRIX: &str = "1 0 0 10 0 1 0 -5 0 0 1 2.5 0 0 0 1";

    fn config() -> ConfigElement {
        ConfigElement::new("Command")
            .with_attribute("Name", "UpdateTransform")
            .with_attribute("Id", "3")
            .with_attribute("DeviceName", "Tracker")
            .with_attribute("TransformName", "ProbeToTracker")
            .with_attribute("TransformValue", MATRIX)
            .with_attribute("TransformPersistent", "FALSE")
            .with_attribute("TransformError", "0.25")
            .with_attribute("TransformDate", "2026-10-19")
    }

    #[test]
    fn test_update_then_read_back() {
        let (ctx, sink) = create_test_context();
        let mut cmd = UpdateTransformCommand::default();
        cmd.read_configuration(&config()).unwrap();
        cmd.execute(&ctx).unwrap();

        assert_eq!(sink.replies()[0].message, "Transform ProbeToTracker updated");
        let name = TransformName::parse("ProbeToTracker").unwrap();
        let stored = ctx.transform_repository().get_transform(&name).unwrap();
        assert_eq!(stored.matrix[3], 10.0);
        assert!(!stored.persistent);
        assert_eq!(stored.error, Some(0.25));
        assert_eq!(stored.date.as_deref(), Some("2026-10-19"));
    }

    #[test]
    fn test_defaults() {
        let config = ConfigElement::new("Command")
            .with_attribute("Name", "UpdateTransform")
            .with_attribute("TransformName", "ProbeToTracker")
            .with_attribute("TransformValue", MATRIX);
        let mut cmd = UpdateTransformCommand::default();
        cmd.read_configuration(&config).unwrap();
        assert!(cmd.persistent());
        assert_eq!(cmd.error(), None);
        assert_eq!(cmd.date(), None);
    }

    #[test]
    fn test_missing_value_names_attribute() {
        let mut config = config();
        config.remove_attribute("TransformValue");
        let mut cmd = UpdateTransformCommand::default();
        let err = cmd.read_configuration(&config).unwrap_err();
        assert!(matches!(
            err,
            ServerError::Validation {
                kind: ValidationErrorKind::MissingParameter { ref param }
            } if param == "TransformValue"
        ));
    }

    #[test]
    fn test_wrong_value_count() {
        let mut config = config();
        config.set_attribute("TransformValue", "1 0 0");
        let mut cmd = UpdateTransformCommand::default();
        assert!(cmd.read_configuration(&config).unwrap_err().is_validation());
    }

    #[test]
    fn test_configuration_round_trip() {
        let mut cmd = UpdateTransformCommand::default();
        cmd.read_configuration(&config()).unwrap();

        let mut written = ConfigElement::new("Command");
        cmd.write_configuration(&mut written).unwrap();
        let mut reread = UpdateTransformCommand::default();
        reread.read_configuration(&written).unwrap();

        assert_eq!(reread.name(), cmd.name());
        assert_eq!(reread.id(), cmd.id());
        assert_eq!(reread.device_name(), cmd.device_name());
        assert_eq!(reread.transform_name(), cmd.transform_name());
        assert_eq!(reread.matrix(), cmd.matrix());
        assert_eq!(reread.persistent(), cmd.persistent());
        assert_eq!(reread.error(), cmd.error());
        assert_eq!(reread.date(), cmd.date());
    }
}
