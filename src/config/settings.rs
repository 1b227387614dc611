//! Configuration settings for the command daemon.

use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use crate::device::DeviceKind;
use crate::error::ServerError;
use crate::transform::TransformName;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
    /// Maximum concurrent client connections.
    #[serde(default = "default_max_connections")]
    pub max_concurrent_connections: usize,
    /// How long the processor keeps polling a pending command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    /// Delay between two polls of a pending command.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Requests one connection may have in flight before reading pauses.
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,
}

/// A simulated device exposed through the data collector.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub kind: DeviceKind,
    /// Frames produced by one acquisition poll.
    #[serde(default = "default_frames_per_poll")]
    pub frames_per_poll: u32,
    /// Output channel published by this device, if any.
    #[serde(default)]
    pub output_channel: Option<String>,
    /// Device whose frames a capture device records.
    #[serde(default)]
    pub source: Option<String>,
}

/// A transform preloaded into the transform repository.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    /// Transform name in `FromToTo` form, e.g. `ProbeToTracker`.
    pub name: String,
    /// Row-major 4x4 matrix.
    pub matrix: Vec<f64>,
    #[serde(default = "default_persistent")]
    pub persistent: bool,
    #[serde(default)]
    pub error: Option<f64>,
}

// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1:18944".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_message_size() -> usize {
    1_048_576 // 1MB
}

fn default_socket_timeout() -> u64 {
    300
}

fn default_max_connections() -> usize {
    32
}

fn default_command_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    50
}

fn default_max_pending_requests() -> usize {
    64
}

fn default_frames_per_poll() -> u32 {
    1
}

fn default_persistent() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            socket_timeout_seconds: default_socket_timeout(),
            max_concurrent_connections: default_max_connections(),
            command_timeout_seconds: default_command_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_pending_requests: default_max_pending_requests(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| ServerError::Config {
            message: format!("Invalid config file '{}': {}", path.display(), e),
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ServerError> {
        let settings: Settings = toml::from_str(content).map_err(|e| ServerError::Config {
            message: format!("Failed to parse TOML: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ServerError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ServerError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ServerError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ServerError::Config {
                message: format!(
                    "Invalid bind address '{}'. Expected host:port",
                    self.server.bind_address
                ),
            });
        }

        self.validate_limits()?;

        self.validate_devices()?;
        self.validate_transforms()
    }

    fn validate_limits(&self) -> Result<(), ServerError> {
        let limits = &self.limits;
        let checks = [
            ("max_message_size", limits.max_message_size as u64),
            ("socket_timeout_seconds", limits.socket_timeout_seconds),
            ("max_concurrent_connections", limits.max_concurrent_connections as u64),
            ("command_timeout_seconds", limits.command_timeout_seconds),
            ("poll_interval_ms", limits.poll_interval_ms),
            ("max_pending_requests", limits.max_pending_requests as u64),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ServerError::Config {
                message: format!("limits.{} must be non-zero", name),
            }),
            None => Ok(()),
        }
    }

    fn validate_devices(&self) -> Result<(), ServerError> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(ServerError::Config {
                    message: "Device id must not be empty".to_string(),
                });
            }
            if !seen.insert(device.id.as_str()) {
                return Err(ServerError::Config {
                    message: format!("Duplicate device id '{}'", device.id),
                });
            }
            if device.frames_per_poll == 0 {
                return Err(ServerError::Config {
                    message: format!(
                        "Device '{}' must produce at least one frame per poll",
                        device.id
                    ),
                });
            }
        }

        for device in &self.devices {
            match (&device.kind, &device.source) {
                (DeviceKind::Capture, Some(source)) => {
                    let known = self
                        .devices
                        .iter()
                        .any(|d| &d.id == source && d.kind != DeviceKind::Capture);
                    if !known {
                        return Err(ServerError::Config {
                            message: format!(
                                "Capture device '{}' records from unknown device '{}'",
                                device.id, source
                            ),
                        });
                    }
                }
                (DeviceKind::Capture, None) => {
                    return Err(ServerError::Config {
                        message: format!("Capture device '{}' needs a source device", device.id),
                    });
                }
                (_, Some(_)) => {
                    return Err(ServerError::Config {
                        message: format!("Only capture devices take a source ('{}')", device.id),
                    });
                }
                (_, None) => {}
            }
        }

        Ok(())
    }

    fn validate_transforms(&self) -> Result<(), ServerError> {
        for transform in &self.transforms {
            TransformName::parse(&transform.name).map_err(|e| ServerError::Config {
                message: format!("Invalid transform '{}': {}", transform.name, e),
            })?;
            if transform.matrix.iter().any(|v| !v.is_finite()) {
                return Err(ServerError::Config {
                    message: format!(
                        "Transform '{}' has a non-finite matrix value",
                        transform.name
                    ),
                });
            }
            if transform.matrix.len() != 16 {
                return Err(ServerError::Config {
                    message: format!(
                        "Transform '{}' needs 16 matrix values, got {}",
                        transform.name,
                        transform.matrix.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
bind_address = "0.0.0.0:18944"

[logging]
level = "debug"
format = "json"

[[devices]]
id = "Tracker"
kind = "tracker"
frames_per_poll = 2
output_channel = "TrackerStream"

[[devices]]
id = "Capture"
kind = "capture"
source = "Tracker"

[[transforms]]
name = "ProbeToTracker"
matrix = [1.0, 0.0, 0.0, 10.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]
"#;

    #[test]
    fn test_default_values() {
        assert_eq!(default_bind_address(), "127.0.0.1:18944");
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert_eq!(settings.devices.len(), 2);
        assert_eq!(settings.devices[0].frames_per_poll, 2);
        assert_eq!(settings.devices[1].kind, DeviceKind::Capture);
        assert_eq!(settings.limits.poll_interval_ms, 50);
        assert!(settings.transforms[0].persistent);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let settings = Settings::from_toml(include_str!("../../config/daemon.toml")).unwrap();
        assert_eq!(settings.devices.len(), 3);
        assert_eq!(settings.transforms.len(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.server.bind_address, "0.0.0.0:18944");
    }

    #[test]
    fn test_missing_file() {
        let result = Settings::load("/nonexistent/devctl.toml");
        assert!(matches!(result, Err(ServerError::Config { .. })));
    }

    #[test]
    fn test_rejects_duplicate_device() {
        let toml = r#"
[[devices]]
id = "Tracker"
kind = "tracker"

[[devices]]
id = "Tracker"
kind = "imaging"
"#;
        assert!(Settings::from_toml(toml).is_err());
    }

    #[test]
    fn test_rejects_capture_with_unknown_source() {
        let toml = r#"
[[devices]]
id = "Capture"
kind = "capture"
source = "Missing"
"#;
        assert!(Settings::from_toml(toml).is_err());
    }

    #[test]
    fn test_rejects_short_matrix() {
        let toml = r#"
[[transforms]]
name = "ProbeToTracker"
matrix = [1.0, 0.0]
"#;
        assert!(Settings::from_toml(toml).is_err());
    }

    #[test]
    fn test_rejects_bad_log_level() {
        let toml = r#"
[logging]
level = "loud"
"#;
        assert!(Settings::from_toml(toml).is_err());
    }

    #[test]
    fn test_rejects_each_zero_limit() {
        for limit in [
            "max_message_size",
            "socket_timeout_seconds",
            "max_concurrent_connections",
            "command_timeout_seconds",
            "poll_interval_ms",
            "max_pending_requests",
        ] {
            let toml = format!("[limits]\n{} = 0\n", limit);
            let err = Settings::from_toml(&toml).unwrap_err();
            assert!(err.to_string().contains(limit), "{} = 0 should be rejected", limit);
        }
    }

    #[test]
    fn test_rejects_non_finite_matrix() {
        let toml = r#"
[[transforms]]
name = "ProbeToTracker"
matrix = [1.0, 0.0, 0.0, nan, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]
"#;
        assert!(Settings::from_toml(toml).is_err());
    }
}
