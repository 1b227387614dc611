//! Reply types and reply channel naming.

use serde::{Deserialize, Serialize};

/// Identifies a connected client. Used for routing only.
pub type ClientId = u32;

/// Suffix appended to a device name to form its reply channel.
pub const REPLY_DEVICE_SUFFIX: &str = "Reply";

/// Reply channel for commands addressed to `device_name`.
///
/// Clients predict the channel without a lookup: `Tracker` replies on
/// `TrackerReply`.
pub fn reply_device_name(device_name: &str) -> String {
    format!("{}{}", device_name, REPLY_DEVICE_SUFFIX)
}

/// Outcome carried by a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAIL")]
    Failure,
}

impl ReplyStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// A reply to one command request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Reply channel, derived from the request's device name.
    pub device_name: String,

    /// Correlation id echoed from the request.
    pub id: String,

    /// Client the reply is routed to. Never sent to the peer.
    #[serde(skip)]
    pub client_id: ClientId,

    pub status: ReplyStatus,

    /// Human-readable result.
    pub message: String,
}

impl Reply {
    /// Create a failure reply for a request that never became a command.
    pub fn failure(
        device_name: &str,
        id: impl Into<String>,
        client_id: ClientId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device_name: reply_device_name(device_name),
            id: id.into(),
            client_id,
            status: ReplyStatus::Failure,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reply_device_name_is_deterministic() {
        assert_eq!(reply_device_name("Tracker"), "TrackerReply");
        assert_eq!(reply_device_name("Tracker"), reply_device_name("Tracker"));
    }

    #[test]
    fn test_reply_device_names_do_not_collide() {
        let devices = ["", "A", "AB", "Tracker", "TrackerReply", "Reply", "tracker"];
        let names: HashSet<_> = devices.iter().map(|d| reply_device_name(d)).collect();
        assert_eq!(names.len(), devices.len());
    }

    #[test]
    fn test_reply_serialization_hides_client() {
        let reply = Reply {
            device_name: reply_device_name("Tracker"),
            id: "42".to_string(),
            client_id: 7,
            status: ReplyStatus::Success,
            message: "done".to_string(),
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["device_name"], "TrackerReply");
        assert_eq!(json["id"], "42");
        assert_eq!(json["status"], "SUCCESS");
        assert!(json.get("client_id").is_none());

        let parsed: Reply = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.client_id, 0);
    }

    #[test]
    fn test_failure_reply() {
        let reply = Reply::failure("Tracker", "9", 3, "Unknown command: Fly");
        assert!(!reply.is_success());
        assert_eq!(reply.device_name, "TrackerReply");
        assert_eq!(reply.client_id, 3);
        assert_eq!(serde_json::to_value(&reply).unwrap()["status"], "FAIL");
    }
}
