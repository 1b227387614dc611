//! Device and channel discovery.

use crate::config_tree::ConfigElement;
use crate::device::DeviceKind;
use crate::error::ServerError;
use crate::protocol::ReplyStatus;

use super::super::traits::Command;
use super::super::types::{describe_commands, CommandBase, ExecutionContext};

const REQUEST_DEVICE_IDS: &str = "RequestDeviceIds";
const REQUEST_CHANNEL_IDS: &str = "RequestChannelIds";

/// Lists device or channel ids known to the data collector.
///
/// The reply message is a comma-separated id list. `RequestDeviceIds`
/// accepts an optional `DeviceType` filter (`tracker`, `imaging`, `capture`).
#[derive(Debug, Clone, Default)]
pub struct RequestIdsCommand {
    base: CommandBase,
    device_type: Option<DeviceKind>,
}

impl RequestIdsCommand {
    pub fn device_type(&self) -> Option<DeviceKind> {
        self.device_type
    }
}

impl Command for RequestIdsCommand {
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
        &[REQUEST_DEVICE_IDS, REQUEST_CHANNEL_IDS]
    }

    fn description(&self, command_name: Option<&str>) -> String {
        describe_commands(
            &[
                (
                    REQUEST_DEVICE_IDS,
                    "List device ids, optionally filtered by DeviceType.",
                ),
                (REQUEST_CHANNEL_IDS, "List output channel ids."),
            ],
            command_name,
        )
    }

    fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        self.base.read_configuration(config)?;
        self.validate_name()?;
        self.device_type = match config.attribute("DeviceType") {
            None => None,
            Some(raw) => Some(DeviceKind::from_name(raw).ok_or_else(|| {
                ServerError::invalid_parameter(
                    "DeviceType",
                    format!("unknown device type '{}'", raw),
                )
            })?),
        };
        Ok(())
    }

    fn write_configuration(&self, config: &mut ConfigElement) -> Result<(), ServerError> {
        self.base.write_configuration(config);
        if let Some(kind) = self.device_type {
            config.set_display_attribute("DeviceType", kind);
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &ExecutionContext) -> Result<(), ServerError> {
        if self.base.is_completed() {
            return Ok(());
        }
        self.validate_name()?;

        let collector = ctx.data_collector();
        let ids = if self.base.name() == Some(REQUEST_CHANNEL_IDS) {
            collector.channel_ids()?
        } else {
            collector.device_ids(self.device_type)?
        };

        self.base.complete(ctx, ReplyStatus::Success, ids.join(","))
    }
}
