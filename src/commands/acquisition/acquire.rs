//! Multi-tick frame acquisition.

use crate::config_tree::ConfigElement;
use crate::error::ServerError;
use crate::protocol::ReplyStatus;

use super::super::traits::Command;
use super::super::types::{describe_commands, CommandBase, ExecutionContext};

const ACQUIRE: &str = "Acquire";

/// Collects `FrameCount` frames from a tracker or imaging device.
///
/// A device yields a limited number of frames per poll, so the command
/// usually spans several `execute` ticks. Each tick continues where the
/// previous one stopped; the reply is sent once enough frames arrived.
#[derive(Debug, Clone)]
pub struct AcquireCommand {
    base: CommandBase,
    frame_count: u32,
    device_id: Option<String>,
    acquired: u64,
}

impl Default for AcquireCommand {
    fn default() -> Self {
        Self {
            base: CommandBase::new(),
            frame_count: 1,
            device_id: None,
            acquired: 0,
        }
    }
}

impl AcquireCommand {
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Frames collected so far.
    pub fn acquired(&self) -> u64 {
        self.acquired
    }

    /// Explicit `DeviceId`, falling back to the addressed device.
    fn target_device(&self) -> Result<String, ServerError> {
        let device = self
            .device_id
            .as_deref()
            .unwrap_or_else(|| self.base.device_name());
        if device.is_empty() {
            return Err(ServerError::missing_parameter("DeviceId"));
        }
        Ok(device.to_string())
    }
}

impl Command for AcquireCommand {
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
        &[ACQUIRE]
    }

    fn description(&self, command_name: Option<&str>) -> String {
        describe_commands(
            &[(
                ACQUIRE,
                "Acquire FrameCount frames (default 1) from DeviceId or the addressed device.",
            )],
            command_name,
        )
    }

    fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        self.base.read_configuration(config)?;
        self.validate_name()?;

        let frame_count = config.parse_attribute::<u32>("FrameCount")?.unwrap_or(1);
        if frame_count == 0 {
            return Err(ServerError::invalid_parameter(
                "FrameCount",
                "must be at least 1",
            ));
        }
        self.frame_count = frame_count;
        self.device_id = config.attribute("DeviceId").map(str::to_string);
        Ok(())
    }

    fn write_configuration(&self, config: &mut ConfigElement) -> Result<(), ServerError> {
        self.base.write_configuration(config);
        config.set_display_attribute("FrameCount", self.frame_count);
        if let Some(device_id) = &self.device_id {
            config.set_attribute("DeviceId", device_id.as_str());
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &ExecutionContext) -> Result<(), ServerError> {
        if self.base.is_completed() {
            return Ok(());
        }
        self.validate_name()?;

        let device = self.target_device()?;
        let remaining = u64::from(self.frame_count).saturating_sub(self.acquired);
        let frames = ctx.data_collector().acquire(&device, remaining)?;
        self.acquired += frames.len() as u64;

        if self.acquired >= u64::from(self.frame_count) {
            let message = format!("Acquired {} frames from {}", self.acquired, device);
            self.base.complete(ctx, ReplyStatus::Success, message)?;
        }
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.base.is_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::types::test_support::create_test_context;

    fn configured(attrs: &[(&str, &str)]) -> AcquireCommand {
        let mut config = ConfigElement::new("Command").with_attribute("Name", "Acquire");
        for (key, value) in attrs {
            config.set_attribute(*key, *value);
        }
        let mut cmd = AcquireCommand::default();
        cmd.read_configuration(&config).unwrap();
        cmd
    }

    #[test]
    fn test_spans_multiple_ticks() {
        let (ctx, sink) = create_test_context();
        // Tracker yields 2 frames per poll.
        let mut cmd = configured(&[("DeviceName", "Tracker"), ("Id", "42"), ("FrameCount", "5")]);

        cmd.execute(&ctx).unwrap();
        assert!(!cmd.is_completed());
        cmd.execute(&ctx).unwrap();
        assert!(!cmd.is_completed());
        cmd.execute(&ctx).unwrap();
        assert!(cmd.is_completed());
        assert_eq!(cmd.acquired(), 5);

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].device_name, "TrackerReply");
        assert_eq!(replies[0].id, "42");
        assert!(replies[0].message.contains("5 frames"));
    }

    #[test]
    fn test_completion_is_monotonic() {
        let (ctx, sink) = create_test_context();
        let mut cmd = configured(&[("DeviceName", "Tracker")]);

        cmd.execute(&ctx).unwrap();
        assert!(cmd.is_completed());
        for _ in 0..3 {
            assert!(cmd.is_completed());
            cmd.execute(&ctx).unwrap();
        }
        assert_eq!(sink.replies().len(), 1);
        assert_eq!(cmd.acquired(), 1);
    }

    #[test]
    fn test_device_id_overrides_device_name() {
        let (ctx, sink) = create_test_context();
        let mut cmd = configured(&[("DeviceName", "Tracker"), ("DeviceId", "Video")]);
        cmd.execute(&ctx).unwrap();
        assert!(sink.replies()[0].message.ends_with("from Video"));
        assert_eq!(sink.replies()[0].device_name, "TrackerReply");
    }

    #[test]
    fn test_unknown_device_is_execution_error() {
        let (ctx, sink) = create_test_context();
        let mut cmd = configured(&[("DeviceName", "Laser")]);
        let err = cmd.execute(&ctx).unwrap_err();
        assert!(!err.is_validation());
        assert!(!cmd.is_completed());
        assert!(sink.replies().is_empty());
    }

    #[test]
    fn test_zero_frames_rejected() {
        let config = ConfigElement::new("Command")
            .with_attribute("Name", "Acquire")
            .with_attribute("FrameCount", "0");
        let mut cmd = AcquireCommand::default();
        assert!(cmd.read_configuration(&config).unwrap_err().is_validation());
    }

    #[test]
    fn test_configuration_round_trip() {
        let cmd = configured(&[
            ("Id", "9"),
            ("DeviceName", "Tracker"),
            ("FrameCount", "12"),
            ("DeviceId", "Video"),
        ]);

        let mut written = ConfigElement::new("Command");
        cmd.write_configuration(&mut written).unwrap();
        let mut reread = AcquireCommand::default();
        reread.read_configuration(&written).unwrap();

        assert_eq!(reread.name(), Some("Acquire"));
        assert_eq!(reread.id(), Some("9"));
        assert_eq!(reread.device_name(), "Tracker");
        assert_eq!(reread.frame_count(), 12);
        assert_eq!(reread.device_id(), Some("Video"));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = configured(&[("FrameCount", "3")]);
        let mut copy = original.clone_box();
        let config = ConfigElement::new("Command")
            .with_attribute("Name", "Acquire")
            .with_attribute("FrameCount", "8");
        copy.read_configuration(&config).unwrap();

        let mut written = ConfigElement::new("Command");
        copy.write_configuration(&mut written).unwrap();
        assert_eq!(written.attribute("FrameCount"), Some("8"));
        assert_eq!(original.frame_count(), 3);
    }
}
