//! Error types for the command daemon.

use thiserror::Error;

/// Main error type for the daemon.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Validation errors (command name, request parameters).
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Command dispatch and execution errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Errors reported by the device or transform collaborators.
    #[error("Collaborator error: {kind}")]
    Collaborator { kind: CollaboratorErrorKind },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Command name is not set")]
    CommandNameNotSet,

    #[error("Command name '{name}' is not supported by this handler (supported: {supported})")]
    UnsupportedCommandName { name: String, supported: String },

    #[error("Missing required parameter: {param}")]
    MissingParameter { param: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Command name '{name}' is already registered")]
    DuplicateCommandName { name: String },

    #[error("Command '{name}' is already completed")]
    AlreadyCompleted { name: String },

    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Client {client_id} is not connected")]
    ClientDisconnected { client_id: u32 },
}

/// Device and transform collaborator error kinds.
#[derive(Error, Debug)]
pub enum CollaboratorErrorKind {
    #[error("Unknown device: {device}")]
    UnknownDevice { device: String },

    #[error("Device '{device}' is not a {expected} device")]
    WrongDeviceKind { device: String, expected: String },

    #[error("Recording on '{device}' cannot {action} while {state}")]
    InvalidRecordingState {
        device: String,
        action: String,
        state: String,
    },

    #[error("Invalid transform name: {name}")]
    InvalidTransformName { name: String },

    #[error("Transform not found: {name}")]
    TransformNotFound { name: String },

    #[error("Transform '{name}' is not invertible")]
    SingularTransform { name: String },

    #[error("Collaborator state is unavailable: {message}")]
    Unavailable { message: String },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

impl ServerError {
    /// Shorthand for a missing required parameter.
    pub fn missing_parameter(param: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationErrorKind::MissingParameter {
                param: param.into(),
            },
        }
    }

    /// Shorthand for a malformed parameter value.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: param.into(),
                message: message.into(),
            },
        }
    }

    /// Whether this error was raised while validating a request.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type alias for daemon operations.
pub type ServerResult<T> = Result<T, ServerError>;
