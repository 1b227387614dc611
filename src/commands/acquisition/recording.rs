//! Recording control for capture devices.

use chrono::Utc;

use crate::config_tree::ConfigElement;
use crate::error::ServerError;
use crate::protocol::ReplyStatus;

use super::super::traits::Command;
use super::super::types::{describe_commands, CommandBase, ExecutionContext};

const START_RECORDING: &str = "StartRecording";
const SUSPEND_RECORDING: &str = "SuspendRecording";
const RESUME_RECORDING: &str = "ResumeRecording";
const STOP_RECORDING: &str = "StopRecording";

/// Starts, suspends, resumes and stops recordings on a capture device.
#[derive(Debug, Clone, Default)]
pub struct RecordingCommand {
    base: CommandBase,
    capture_device_id: String,
    output_filename: Option<String>,
}

impl RecordingCommand {
    pub fn capture_device_id(&self) -> &str {
        &self.capture_device_id
    }

    pub fn output_filename(&self) -> Option<&str> {
        self.output_filename.as_deref()
    }
}

fn default_filename() -> String {
    Utc::now().format("Recording_%Y%m%d_%H%M%S.mha").to_string()
}

impl Command for RecordingCommand {
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
        &[
            START_RECORDING,
            SUSPEND_RECORDING,
            RESUME_RECORDING,
            STOP_RECORDING,
        ]
    }

    fn description(&self, command_name: Option<&str>) -> String {
        describe_commands(
            &[
                (
                    START_RECORDING,
                    "Start recording on CaptureDeviceId into OutputFilename (timestamped by default).",
                ),
                (SUSPEND_RECORDING, "Pause the recording on CaptureDeviceId."),
                (RESUME_RECORDING, "Continue a paused recording on CaptureDeviceId."),
                (
                    STOP_RECORDING,
                    "Finish the recording on CaptureDeviceId, optionally renaming it to OutputFilename.",
                ),
            ],
            command_name,
        )
    }

    fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        self.base.read_configuration(config)?;
        self.validate_name()?;
        self.capture_device_id = config.required_attribute("CaptureDeviceId")?.to_string();
        self.output_filename = config.attribute("OutputFilename").map(str::to_string);
        Ok(())
    }

    fn write_configuration(&self, config: &mut ConfigElement) -> Result<(), ServerError> {
        self.base.write_configuration(config);
        config.set_attribute("CaptureDeviceId", self.capture_device_id.as_str());
        if let Some(filename) = &self.output_filename {
            config.set_attribute("OutputFilename", filename.as_str());
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &ExecutionContext) -> Result<(), ServerError> {
        if self.base.is_completed() {
            return Ok(());
        }
        self.validate_name()?;
        if self.capture_device_id.is_empty() {
            return Err(ServerError::missing_parameter("CaptureDeviceId"));
        }

        let collector = ctx.data_collector();
        let capture = self.capture_device_id.as_str();
        let message = match self.base.name().unwrap_or_default() {
            START_RECORDING => {
                let filename = self
                    .output_filename
                    .clone()
                    .unwrap_or_else(default_filename);
                collector.start_recording(capture, &filename)?;
                format!("Recording to {} started on {}", filename, capture)
            }
            SUSPEND_RECORDING => {
                collector.suspend_recording(capture)?;
                format!("Recording suspended on {}", capture)
            }
            RESUME_RECORDING => {
                collector.resume_recording(capture)?;
                format!("Recording resumed on {}", capture)
            }
            _ => {
                let summary = collector.stop_recording(capture, self.output_filename.as_deref())?;
                format!(
                    "Recorded {} frames to {} on {}",
                    summary.frames, summary.filename, capture
                )
            }
        };

        self.base.complete(ctx, ReplyStatus::Success, message)
    }
}
