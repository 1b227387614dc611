//! Request types for the command protocol.

use serde::{Deserialize, Serialize};

use crate::config_tree::ConfigElement;

/// Attribute carrying the command name.
pub const NAME_ATTRIBUTE: &str = "Name";
/// Attribute carrying the correlation id.
pub const ID_ATTRIBUTE: &str = "Id";
/// Attribute carrying the target device name.
pub const DEVICE_NAME_ATTRIBUTE: &str = "DeviceName";

/// A command request from a client.
///
/// The `command` element carries the command name and every parameter as
/// attributes, e.g. `{"name": "Command", "attributes": {"Name": "Acquire"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Device the command addresses. Replies go to `<device_name>Reply`.
    pub device_name: String,

    /// Command parameters.
    pub command: ConfigElement,
}

impl CommandRequest {
    /// Create a request for `name` addressed to `device_name`.
    pub fn new(device_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            command: ConfigElement::new("Command").with_attribute(NAME_ATTRIBUTE, name),
        }
    }

    /// Set the correlation id (builder pattern).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.command.set_attribute(ID_ATTRIBUTE, id);
        self
    }

    /// Add a command parameter (builder pattern).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.command.set_attribute(key, value);
        self
    }

    /// The requested command name.
    pub fn command_name(&self) -> Option<&str> {
        self.command.attribute(NAME_ATTRIBUTE)
    }

    /// The client-supplied correlation id.
    pub fn id(&self) -> Option<&str> {
        self.command.attribute(ID_ATTRIBUTE)
    }
}
