//! Echo command for connectivity checks.

use crate::config_tree::ConfigElement;
use crate::error::ServerError;
use crate::protocol::ReplyStatus;

use super::super::traits::Command;
use super::super::types::{describe_commands, CommandBase, ExecutionContext};

const ECHO: &str = "Echo";

/// Replies with the text it was sent.
///
/// Used for health checks and verifying the reply channel.
#[derive(Debug, Clone, Default)]
pub struct EchoCommand {
    base: CommandBase,
    text: String,
}

impl EchoCommand {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

impl Command for EchoCommand {
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
        &[ECHO]
    }

    fn description(&self, command_name: Option<&str>) -> String {
        describe_commands(
            &[(ECHO, "Reply with the Text attribute unchanged.")],
            command_name,
        )
    }

    fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        self.base.read_configuration(config)?;
        self.validate_name()?;
        self.text = config.attribute("Text").unwrap_or_default().to_string();
        Ok(())
    }

    fn write_configuration(&self, config: &mut ConfigElement) -> Result<(), ServerError> {
        self.base.write_configuration(config);
        config.set_attribute("Text", self.text.as_str());
        Ok(())
    }

    fn execute(&mut self, ctx: &ExecutionContext) -> Result<(), ServerError> {
        if self.base.is_completed() {
            return Ok(());
        }
        self.validate_name()?;
        self.base
            .complete(ctx, ReplyStatus::Success, self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::types::test_support::create_test_context;

    #[test]
    fn test_echo_names() {
        let cmd = EchoCommand::default();
        assert_eq!(cmd.command_names(), &["Echo"]);
        assert!(cmd.description(Some("Echo")).contains("Text"));
        assert!(cmd.description(Some("Ping")).contains("not supported"));
    }

    #[test]
    fn test_echo_execute() {
        let (ctx, sink) = create_test_context();
        let mut cmd = EchoCommand::default();
        let config = ConfigElement::new("Command")
            .with_attribute("Name", "Echo")
            .with_attribute("Id", "7")
            .with_attribute("Text", "hello");
        cmd.read_configuration(&config).unwrap();

        cmd.execute(&ctx).unwrap();
        assert!(cmd.is_completed());

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message, "hello");
        assert_eq!(replies[0].id, "7");
    }

    #[test]
    fn test_echo_without_name_fails_validation() {
        let (ctx, sink) = create_test_context();
        let mut cmd = EchoCommand::default();

        let err = cmd.execute(&ctx).unwrap_err();
        assert!(err.is_validation());
        assert!(sink.replies().is_empty());
    }

    #[test]
    fn test_execute_after_completion_is_noop() {
        let (ctx, sink) = create_test_context();
        let mut cmd = EchoCommand::default();
        cmd.base_mut().set_name("Echo").unwrap();

        cmd.execute(&ctx).unwrap();
        cmd.execute(&ctx).unwrap();
        assert_eq!(sink.replies().len(), 1);
    }
}
