//! Command processor: resolves, configures, runs and replies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::commands::{Command, CommandRegistry, ExecutionContext, ReplySink};
use crate::config::LimitsConfig;
use crate::device::DataCollector;
use crate::error::{CommandErrorKind, ServerError, ValidationErrorKind};
use crate::protocol::{ClientId, CommandRequest, Reply, ReplyStatus};
use crate::transform::TransformRepository;

/// Owns the registry and the collaborators commands run against.
///
/// One processor serves every connection. Each request gets its own
/// command instance; a failing request never affects the next one.
pub struct CommandProcessor {
    registry: CommandRegistry,
    data_collector: Arc<DataCollector>,
    transforms: Arc<TransformRepository>,
    replies: Arc<dyn ReplySink>,
    command_timeout: Duration,
    poll_interval: Duration,
}

impl CommandProcessor {
    /// Create a new processor.
    pub fn new(
        registry: CommandRegistry,
        data_collector: Arc<DataCollector>,
        transforms: Arc<TransformRepository>,
        replies: Arc<dyn ReplySink>,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            registry,
            data_collector,
            transforms,
            replies,
            command_timeout: Duration::from_secs(limits.command_timeout_seconds),
            poll_interval: Duration::from_millis(limits.poll_interval_ms),
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn data_collector(&self) -> &Arc<DataCollector> {
        &self.data_collector
    }

    pub fn transform_repository(&self) -> &Arc<TransformRepository> {
        &self.transforms
    }

    /// Hand a reply to the transport.
    pub fn send_reply(&self, reply: Reply) -> Result<(), ServerError> {
        self.replies.send_reply(reply)
    }

    /// Collaborators for one `execute` call.
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(
            Arc::clone(&self.data_collector),
            Arc::clone(&self.transforms),
            Arc::clone(&self.replies),
        )
    }

    /// Turn a request into a configured command, ready to execute.
    ///
    /// Fails before anything executes when the name is missing or unknown,
    /// or when the parameters do not validate.
    pub fn prepare(
        &self,
        request: &CommandRequest,
        client_id: ClientId,
    ) -> Result<Box<dyn Command>, ServerError> {
        let name = request
            .command_name()
            .ok_or(ServerError::Validation {
                kind: ValidationErrorKind::CommandNameNotSet,
            })?;

        let mut command = self.registry.resolve(name)?;
        {
            let base = command.base_mut();
            base.set_device_name(request.device_name.as_str())?;
            base.set_client_id(client_id);
        }
        command.read_configuration(&request.command)?;
        command.validate_name()?;

        if command.id().is_none() {
            command.base_mut().set_id(Uuid::new_v4().to_string())?;
        }

        debug!(
            command = name,
            id = command.id().unwrap_or_default(),
            client_id,
            "Command configured"
        );
        Ok(command)
    }

    /// Handle one request to the end: exactly one reply is sent for it.
    pub async fn handle(&self, request: CommandRequest, client_id: ClientId) {
        let command = match self.prepare(&request, client_id) {
            Ok(command) => command,
            Err(e) => {
                warn!(
                    command = request.command_name().unwrap_or_default(),
                    client_id,
                    error = %e,
                    "Request rejected"
                );
                let reply = Reply::failure(
                    &request.device_name,
                    request.id().unwrap_or_default(),
                    client_id,
                    e.to_string(),
                );
                if let Err(e) = self.send_reply(reply) {
                    warn!(client_id, error = %e, "Failed to deliver rejection");
                }
                return;
            }
        };

        self.run(command).await;
    }

    /// Execute a configured command until it completes or times out.
    pub async fn run(&self, mut command: Box<dyn Command>) {
        let ctx = self.context();
        let deadline = Instant::now() + self.command_timeout;
        let name = command.name().unwrap_or_default().to_string();
        let id = command.id().unwrap_or_default().to_string();
        let device_name = command.device_name().to_string();
        let client_id = command.client_id();

        info!(command = %name, id = %id, client_id, device = %device_name, "Executing command");

        loop {
            let tick_ctx = ctx.clone();
            let tick = tokio::task::spawn_blocking(move || {
                let result = command.execute(&tick_ctx);
                (command, result)
            })
            .await;

            let (returned, result) = match tick {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The instance was moved into the panicked task and is gone, so
                    // the failure reply is rebuilt from the identity saved above.
                    error!(command = %name, id = %id, error = %e, "Command task panicked");
                    let reply = Reply::failure(
                        &device_name,
                        id.as_str(),
                        client_id,
                        "Command execution failed",
                    );
                    if let Err(e) = self.send_reply(reply) {
                        warn!(client_id, error = %e, "Failed to deliver reply");
                    }
                    return;
                }
            };
            command = returned;

            match result {
                Err(e) => {
                    warn!(command = %name, id = %id, error = %e, "Command failed");
                    finish(command.as_mut(), &ctx, ReplyStatus::Failure, e.to_string());
                    return;
                }
                Ok(()) if command.is_completed() => {
                    if !command.base().is_completed() {
                        finish(command.as_mut(), &ctx, ReplyStatus::Success, String::new());
                    }
                    return;
                }
                Ok(()) => {}
            }

            if Instant::now() >= deadline {
                let err = ServerError::Command {
                    kind: CommandErrorKind::Timeout {
                        timeout_secs: self.command_timeout.as_secs(),
                    },
                };
                warn!(command = %name, id = %id, "Command timed out");
                finish(command.as_mut(), &ctx, ReplyStatus::Failure, err.to_string());
                return;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Run the completion step unless the command already replied.
fn finish(command: &mut dyn Command, ctx: &ExecutionContext, status: ReplyStatus, message: String) {
    if command.base().is_completed() {
        return;
    }
    if let Err(e) = command.base_mut().complete(ctx, status, message) {
        warn!(
            client_id = command.client_id(),
            error = %e,
            "Failed to deliver reply"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::commands::{describe_commands, CommandBase};
    use crate::config::{DeviceConfig, LimitsConfig};
    use crate::config_tree::ConfigElement;
    use crate::device::DeviceKind;

    #[derive(Default)]
    struct RecordingSink {
        replies: Mutex<Vec<Reply>>,
    }

    impl RecordingSink {
        fn replies(&self) -> Vec<Reply> {
            self.replies.lock().unwrap().clone()
        }
    }

    impl ReplySink for RecordingSink {
        fn send_reply(&self, reply: Reply) -> Result<(), ServerError> {
            self.replies.lock().unwrap().push(reply);
            Ok(())
        }
    }

    /// Counts executions; never completes on its own.
    #[derive(Clone, Default)]
    struct StuckCommand {
        base: CommandBase,
        executions: Arc<AtomicUsize>,
    }

    impl Command for StuckCommand {
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
            &["Stuck"]
        }
        fn description(&self, command_name: Option<&str>) -> String {
            describe_commands(&[("Stuck", "Never finishes.")], command_name)
        }
        fn execute(&mut self, _ctx: &ExecutionContext) -> Result<(), ServerError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn is_completed(&self) -> bool {
            false
        }
    }

    /// Succeeds without calling the completion step itself.
    #[derive(Clone, Default)]
    struct SilentCommand {
        base: CommandBase,
    }

    impl Command for SilentCommand {
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
            &["Silent"]
        }
        fn description(&self, command_name: Option<&str>) -> String {
            describe_commands(&[("Silent", "Does nothing.")], command_name)
        }
        fn execute(&mut self, _ctx: &ExecutionContext) -> Result<(), ServerError> {
            Ok(())
        }
    }

    /// Panics inside `execute`.
    #[derive(Clone, Default)]
    struct PanickingCommand {
        base: CommandBase,
    }

    impl Command for PanickingCommand {
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
            &["Explode"]
        }
        fn description(&self, command_name: Option<&str>) -> String {
            describe_commands(&[("Explode", "Panics.")], command_name)
        }
        fn execute(&mut self, _ctx: &ExecutionContext) -> Result<(), ServerError> {
            panic!("device driver fault");
        }
    }

    fn limits() -> LimitsConfig {
        LimitsConfig {
            command_timeout_seconds: 1,
            poll_interval_ms: 5,
            ..LimitsConfig::default()
        }
    }

    fn processor_with(registry: CommandRegistry) -> (CommandProcessor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let devices = vec![DeviceConfig {
            id: "Tracker".to_string(),
            kind: DeviceKind::Tracker,
            frames_per_poll: 1,
            output_channel: None,
            source: None,
        }];
        let processor = CommandProcessor::new(
            registry,
            Arc::new(DataCollector::new(&devices)),
            Arc::new(TransformRepository::new()),
            sink.clone(),
            &limits(),
        );
        (processor, sink)
    }

    #[tokio::test]
    async fn test_acquire_scenario() {
        let (processor, sink) = processor_with(CommandRegistry::new());
        let request = CommandRequest::new("Tracker", "Acquire").with_id("42");

        processor.handle(request, 3).await;

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].device_name, "TrackerReply");
        assert_eq!(replies[0].id, "42");
        assert_eq!(replies[0].client_id, 3);
        assert_eq!(replies[0].status, ReplyStatus::Success);
    }

    #[tokio::test]
    async fn test_multi_tick_acquire_is_polled() {
        let (processor, sink) = processor_with(CommandRegistry::new());
        let request = CommandRequest::new("Tracker", "Acquire")
            .with_id("7")
            .with_param("FrameCount", "4");

        processor.handle(request, 1).await;

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].is_success());
        assert!(replies[0].message.contains("4 frames"));
    }

    #[tokio::test]
    async fn test_unknown_command_rejected_before_execution() {
        let (processor, sink) = processor_with(CommandRegistry::new());
        let request = CommandRequest::new("Tracker", "Unknown").with_id("5");

        assert!(matches!(
            processor.prepare(&request, 1),
            Err(ServerError::Command {
                kind: CommandErrorKind::UnknownCommand { .. }
            })
        ));

        processor.handle(request, 1).await;
        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, ReplyStatus::Failure);
        assert_eq!(replies[0].id, "5");
        assert!(replies[0].message.contains("Unknown"));
    }

    #[tokio::test]
    async fn test_missing_required_attribute_rejected_before_execution() {
        let (processor, sink) = processor_with(CommandRegistry::new());
        let request = CommandRequest::new("Capture", "StartRecording").with_id("8");

        let err = processor.prepare(&request, 1).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("CaptureDeviceId"));

        processor.handle(request, 1).await;
        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].is_success());
        assert!(replies[0].message.contains("CaptureDeviceId"));
    }

    #[tokio::test]
    async fn test_missing_name_rejected() {
        let (processor, sink) = processor_with(CommandRegistry::new());
        let request = CommandRequest {
            device_name: "Tracker".to_string(),
            command: ConfigElement::new("Command"),
        };

        processor.handle(request, 1).await;
        assert_eq!(sink.replies()[0].status, ReplyStatus::Failure);
    }

    #[tokio::test]
    async fn test_execution_error_becomes_failure_reply() {
        let (processor, sink) = processor_with(CommandRegistry::new());
        let request = CommandRequest::new("Tracker", "GetTransform")
            .with_id("9")
            .with_param("TransformName", "StylusToTracker");

        processor.handle(request, 2).await;

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, ReplyStatus::Failure);
        assert!(replies[0].message.contains("StylusToTracker"));
    }

    #[tokio::test]
    async fn test_failed_request_does_not_affect_next() {
        let (processor, sink) = processor_with(CommandRegistry::new());

        processor
            .handle(CommandRequest::new("Tracker", "Unknown").with_id("1"), 1)
            .await;
        processor
            .handle(
                CommandRequest::new("Tracker", "Echo")
                    .with_id("2")
                    .with_param("Text", "still here"),
                1,
            )
            .await;

        let replies = sink.replies();
        assert_eq!(replies.len(), 2);
        assert!(!replies[0].is_success());
        assert!(replies[1].is_success());
        assert_eq!(replies[1].message, "still here");
    }

    #[tokio::test]
    async fn test_processor_assigns_missing_id() {
        let (processor, _sink) = processor_with(CommandRegistry::new());
        let request = CommandRequest::new("Tracker", "Echo");

        let command = processor.prepare(&request, 1).unwrap();
        let id = command.id().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_processor_completes_silent_command() {
        let mut registry = CommandRegistry::empty();
        registry.register(Box::new(SilentCommand::default())).unwrap();
        let (processor, sink) = processor_with(registry);

        processor
            .handle(CommandRequest::new("Tracker", "Silent").with_id("11"), 4)
            .await;

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].is_success());
        assert_eq!(replies[0].id, "11");
    }

    #[tokio::test]
    async fn test_panicking_command_still_replies() {
        let mut registry = CommandRegistry::empty();
        registry.register(Box::new(PanickingCommand::default())).unwrap();
        let (processor, sink) = processor_with(registry);

        processor
            .handle(CommandRequest::new("Tracker", "Explode").with_id("13"), 6)
            .await;

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].device_name, "TrackerReply");
        assert_eq!(replies[0].id, "13");
        assert_eq!(replies[0].client_id, 6);
        assert_eq!(replies[0].status, ReplyStatus::Failure);
        assert_eq!(replies[0].message, "Command execution failed");
    }

    #[tokio::test]
    async fn test_stuck_command_times_out() {
        let executions = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::empty();
        registry
            .register(Box::new(StuckCommand {
                base: CommandBase::new(),
                executions: Arc::clone(&executions),
            }))
            .unwrap();
        let (processor, sink) = processor_with(registry);

        processor
            .handle(CommandRequest::new("Tracker", "Stuck").with_id("12"), 4)
            .await;

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, ReplyStatus::Failure);
        assert!(replies[0].message.contains("timed out"));
        assert!(executions.load(Ordering::SeqCst) > 1);
    }
}
