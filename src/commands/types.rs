//! Command types: shared command state, execution context and reply dispatch.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config_tree::ConfigElement;
use crate::device::DataCollector;
use crate::error::{CommandErrorKind, ServerError};
use crate::protocol::{
    reply_device_name, ClientId, Reply, ReplyStatus, DEVICE_NAME_ATTRIBUTE, ID_ATTRIBUTE,
    NAME_ATTRIBUTE,
};
use crate::transform::TransformRepository;

/// Entry point through which completed commands hand over their reply.
pub trait ReplySink: Send + Sync {
    /// Deliver a reply to the client named by `reply.client_id`.
    fn send_reply(&self, reply: Reply) -> Result<(), ServerError>;
}

/// Collaborators a command may use while executing.
///
/// Handed out by the processor for each `execute` call; commands never keep it.
#[derive(Clone)]
pub struct ExecutionContext {
    data_collector: Arc<DataCollector>,
    transforms: Arc<TransformRepository>,
    replies: Arc<dyn ReplySink>,
}

impl ExecutionContext {
    /// Create a new execution context.
    pub fn new(
        data_collector: Arc<DataCollector>,
        transforms: Arc<TransformRepository>,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            data_collector,
            transforms,
            replies,
        }
    }

    /// The live device collection.
    pub fn data_collector(&self) -> &DataCollector {
        &self.data_collector
    }

    /// The coordinate-transform store.
    pub fn transform_repository(&self) -> &TransformRepository {
        &self.transforms
    }

    /// Hand a reply to the processor for transmission.
    pub fn send_reply(&self, reply: Reply) -> Result<(), ServerError> {
        self.replies.send_reply(reply)
    }
}

/// Identity and completion state shared by every command.
///
/// `completed` can only be set through [`CommandBase::complete`], which
/// also produces the reply, so every completed command has exactly one
/// reply attempt.
#[derive(Debug, Clone, Default)]
pub struct CommandBase {
    name: Option<String>,
    id: Option<String>,
    device_name: String,
    client_id: ClientId,
    completed: bool,
}

impl CommandBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the command name. Rejected once the command completed.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ServerError> {
        self.ensure_pending()?;
        self.name = Some(name.into());
        Ok(())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set the correlation id. Rejected once the reply was sent.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<(), ServerError> {
        self.ensure_pending()?;
        self.id = Some(id.into());
        Ok(())
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn set_device_name(&mut self, device_name: impl Into<String>) -> Result<(), ServerError> {
        self.ensure_pending()?;
        self.device_name = device_name.into();
        Ok(())
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn set_client_id(&mut self, client_id: ClientId) {
        self.client_id = client_id;
    }

    /// Whether the completion step already ran.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Channel the reply is published to.
    pub fn reply_device_name(&self) -> String {
        reply_device_name(&self.device_name)
    }

    /// Read `Name`, `Id` and `DeviceName`. Other attributes are left to the variant.
    pub fn read_configuration(&mut self, config: &ConfigElement) -> Result<(), ServerError> {
        if let Some(name) = config.attribute(NAME_ATTRIBUTE) {
            self.set_name(name)?;
        }
        if let Some(id) = config.attribute(ID_ATTRIBUTE) {
            self.set_id(id)?;
        }
        if let Some(device_name) = config.attribute(DEVICE_NAME_ATTRIBUTE) {
            self.set_device_name(device_name)?;
        }
        Ok(())
    }

    /// Write `Name`, `Id` and `DeviceName`.
    pub fn write_configuration(&self, config: &mut ConfigElement) {
        if let Some(name) = &self.name {
            config.set_attribute(NAME_ATTRIBUTE, name.as_str());
        }
        if let Some(id) = &self.id {
            config.set_attribute(ID_ATTRIBUTE, id.as_str());
        }
        config.set_attribute(DEVICE_NAME_ATTRIBUTE, self.device_name.as_str());
    }

    /// Mark the command completed and hand its reply to the processor.
    ///
    /// Fails without sending anything if the command already completed.
    /// Otherwise the command is completed even when delivery fails.
    pub fn complete(
        &mut self,
        ctx: &ExecutionContext,
        status: ReplyStatus,
        message: impl Into<String>,
    ) -> Result<(), ServerError> {
        if self.completed {
            warn!(
                command = self.display_name(),
                id = self.id().unwrap_or_default(),
                "Command already completed, second reply suppressed"
            );
            return Err(self.already_completed());
        }
        self.completed = true;

        let reply = Reply {
            device_name: self.reply_device_name(),
            id: self.id.clone().unwrap_or_default(),
            client_id: self.client_id,
            status,
            message: message.into(),
        };

        info!(
            command = self.display_name(),
            id = %reply.id,
            client_id = reply.client_id,
            reply_device = %reply.device_name,
            success = status.is_success(),
            "Command completed"
        );

        ctx.send_reply(reply)
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    fn ensure_pending(&self) -> Result<(), ServerError> {
        if self.completed {
            Err(self.already_completed())
        } else {
            Ok(())
        }
    }

    fn already_completed(&self) -> ServerError {
        ServerError::Command {
            kind: CommandErrorKind::AlreadyCompleted {
                name: self.display_name().to_string(),
            },
        }
    }
}

/// Build a command description from `(name, description)` pairs.
///
/// `None` describes every entry; an unsupported name yields an explanation.
pub fn describe_commands(entries: &[(&str, &str)], command_name: Option<&str>) -> String {
    match command_name {
        None => entries
            .iter()
            .map(|(name, text)| format!("{}: {}", name, text))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(requested) => entries
            .iter()
            .find(|(name, _)| *name == requested)
            .map(|(name, text)| format!("{}: {}", name, text))
            .unwrap_or_else(|| format!("'{}' is not supported by this handler", requested)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared helpers for command tests.

    use std::sync::Mutex;

    use super::*;
    use crate::config::DeviceConfig;
    use crate::device::DeviceKind;

    /// Reply sink that keeps every reply.
    #[derive(Default)]
    pub struct CollectingSink {
        replies: Mutex<Vec<Reply>>,
    }

    impl CollectingSink {
        pub fn replies(&self) -> Vec<Reply> {
            self.replies.lock().unwrap().clone()
        }
    }

    impl ReplySink for CollectingSink {
        fn send_reply(&self, reply: Reply) -> Result<(), ServerError> {
            self.replies.lock().unwrap().push(reply);
            Ok(())
        }
    }

    pub fn test_devices() -> Vec<DeviceConfig> {
        vec![
            DeviceConfig {
                id: "Tracker".to_string(),
                kind: DeviceKind::Tracker,
                frames_per_poll: 2,
                output_channel: Some("TrackerStream".to_string()),
                source: None,
            },
            DeviceConfig {
                id: "Video".to_string(),
                kind: DeviceKind::Imaging,
                frames_per_poll: 1,
                output_channel: Some("VideoStream".to_string()),
                source: None,
            },
            DeviceConfig {
                id: "Capture".to_string(),
                kind: DeviceKind::Capture,
                frames_per_poll: 1,
                output_channel: None,
                source: Some("Tracker".to_string()),
            },
        ]
    }

    /// Context over the test devices, an empty transform store and a collecting sink.
    pub fn create_test_context() -> (ExecutionContext, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let ctx = ExecutionContext::new(
            Arc::new(DataCollector::new(&test_devices())),
            Arc::new(TransformRepository::new()),
            sink.clone(),
        );
        (ctx, sink)
    }
}
