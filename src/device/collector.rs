//! In-memory data collector backed by simulated devices.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::{CollaboratorErrorKind, ServerError};

/// Kind of a data-acquisition device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Pose tracker producing tracked frames.
    Tracker,
    /// Imaging device producing image frames.
    Imaging,
    /// Virtual device recording the frames of a source device.
    Capture,
}

impl DeviceKind {
    /// Parse the lowercase name used in configuration and requests.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tracker" => Some(Self::Tracker),
            "imaging" => Some(Self::Imaging),
            "capture" => Some(Self::Capture),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tracker => "tracker",
            Self::Imaging => "imaging",
            Self::Capture => "capture",
        };
        f.write_str(name)
    }
}

/// Recording state of a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Suspended,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

/// One frame produced by a device.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFrame {
    pub device_id: String,
    /// Running frame index on the producing device, starting at 1.
    pub index: u64,
    /// Acquisition time in seconds since the Unix epoch.
    pub timestamp: f64,
}

/// What a capture device recorded between start and stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub device_id: String,
    pub filename: String,
    pub frames: u64,
}

#[derive(Debug)]
struct DeviceState {
    id: String,
    kind: DeviceKind,
    frames_per_poll: u32,
    output_channel: Option<String>,
    source: Option<String>,
    frames_produced: u64,
    recording: RecordingState,
    filename: Option<String>,
    recorded_frames: u64,
}

impl DeviceState {
    fn from_config(config: &DeviceConfig) -> Self {
        Self {
            id: config.id.clone(),
            kind: config.kind,
            frames_per_poll: config.frames_per_poll.max(1),
            output_channel: config.output_channel.clone(),
            source: config.source.clone(),
            frames_produced: 0,
            recording: RecordingState::Idle,
            filename: None,
            recorded_frames: 0,
        }
    }

    fn invalid_transition(&self, action: &str) -> ServerError {
        ServerError::Collaborator {
            kind: CollaboratorErrorKind::InvalidRecordingState {
                device: self.id.clone(),
                action: action.to_string(),
                state: self.recording.to_string(),
            },
        }
    }
}

/// Live device collection shared by all commands.
///
/// All state sits behind one mutex, so concurrent commands see a
/// consistent view of every device.
#[derive(Debug)]
pub struct DataCollector {
    devices: Mutex<Vec<DeviceState>>,
}

impl DataCollector {
    /// Create a collector from the configured devices.
    pub fn new(configs: &[DeviceConfig]) -> Self {
        let devices: Vec<DeviceState> = configs.iter().map(DeviceState::from_config).collect();
        info!(count = devices.len(), "Data collector initialized");
        Self {
            devices: Mutex::new(devices),
        }
    }

    /// Create a collector without devices.
    pub fn empty() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<DeviceState>>, ServerError> {
        self.devices.lock().map_err(|e| ServerError::Collaborator {
            kind: CollaboratorErrorKind::Unavailable {
                message: format!("device state lock poisoned: {}", e),
            },
        })
    }

    /// Ids of all devices, optionally restricted to one kind, in configuration order.
    pub fn device_ids(&self, kind: Option<DeviceKind>) -> Result<Vec<String>, ServerError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|d| kind.map_or(true, |k| d.kind == k))
            .map(|d| d.id.clone())
            .collect())
    }

    /// Output channels published by the devices.
    pub fn channel_ids(&self) -> Result<Vec<String>, ServerError> {
        Ok(self
            .lock()?
            .iter()
            .filter_map(|d| d.output_channel.clone())
            .collect())
    }

    /// Kind of a device.
    pub fn device_kind(&self, device_id: &str) -> Result<DeviceKind, ServerError> {
        let devices = self.lock()?;
        find(&devices, device_id).map(|d| d.kind)
    }

    /// Pull up to `max_frames` new frames from a tracker or imaging device.
    ///
    /// One call yields at most the device's `frames_per_poll`. Active
    /// recordings on capture devices fed by this device pick the frames up.
    pub fn acquire(
        &self,
        device_id: &str,
        max_frames: u64,
    ) -> Result<Vec<TrackedFrame>, ServerError> {
        let mut devices = self.lock()?;

        let device = find_mut(&mut devices, device_id)?;
        if device.kind == DeviceKind::Capture {
            return Err(ServerError::Collaborator {
                kind: CollaboratorErrorKind::WrongDeviceKind {
                    device: device_id.to_string(),
                    expected: "tracker or imaging".to_string(),
                },
            });
        }

        let count = max_frames.min(u64::from(device.frames_per_poll));
        let timestamp = Utc::now().timestamp_millis() as f64 / 1000.0;
        let first = device.frames_produced + 1;
        device.frames_produced += count;

        let frames: Vec<TrackedFrame> = (first..first + count)
            .map(|index| TrackedFrame {
                device_id: device_id.to_string(),
                index,
                timestamp,
            })
            .collect();

        for capture in devices.iter_mut().filter(|d| {
            d.recording == RecordingState::Recording && d.source.as_deref() == Some(device_id)
        }) {
            capture.recorded_frames += count;
        }

        debug!(device = device_id, frames = count, "Frames acquired");
        Ok(frames)
    }

    /// Current recording state of a capture device.
    pub fn recording_state(&self, capture_id: &str) -> Result<RecordingState, ServerError> {
        let devices = self.lock()?;
        capture(&devices, capture_id).map(|d| d.recording)
    }

    /// Start a new recording into `filename`.
    pub fn start_recording(&self, capture_id: &str, filename: &str) -> Result<(), ServerError> {
        let mut devices = self.lock()?;
        let device = capture_mut(&mut devices, capture_id)?;
        if device.recording != RecordingState::Idle {
            return Err(device.invalid_transition("start"));
        }
        device.recording = RecordingState::Recording;
        device.filename = Some(filename.to_string());
        device.recorded_frames = 0;
        info!(device = capture_id, filename, "Recording started");
        Ok(())
    }

    /// Pause an active recording.
    pub fn suspend_recording(&self, capture_id: &str) -> Result<(), ServerError> {
        let mut devices = self.lock()?;
        let device = capture_mut(&mut devices, capture_id)?;
        if device.recording != RecordingState::Recording {
            return Err(device.invalid_transition("suspend"));
        }
        device.recording = RecordingState::Suspended;
        Ok(())
    }

    /// Continue a suspended recording.
    pub fn resume_recording(&self, capture_id: &str) -> Result<(), ServerError> {
        let mut devices = self.lock()?;
        let device = capture_mut(&mut devices, capture_id)?;
        if device.recording != RecordingState::Suspended {
            return Err(device.invalid_transition("resume"));
        }
        device.recording = RecordingState::Recording;
        Ok(())
    }

    /// Finish a recording.
    ///
    /// `filename` overrides the name given at start.
    pub fn stop_recording(
        &self,
        capture_id: &str,
        filename: Option<&str>,
    ) -> Result<RecordingSummary, ServerError> {
        let mut devices = self.lock()?;
        let device = capture_mut(&mut devices, capture_id)?;
        if device.recording == RecordingState::Idle {
            return Err(device.invalid_transition("stop"));
        }

        let filename = filename
            .map(str::to_string)
            .or_else(|| device.filename.take())
            .unwrap_or_default();
        let summary = RecordingSummary {
            device_id: device.id.clone(),
            filename,
            frames: device.recorded_frames,
        };

        device.recording = RecordingState::Idle;
        device.filename = None;
        device.recorded_frames = 0;
        info!(
            device = capture_id,
            frames = summary.frames,
            filename = %summary.filename,
            "Recording stopped"
        );
        Ok(summary)
    }
}

fn unknown_device(device_id: &str) -> ServerError {
    ServerError::Collaborator {
        kind: CollaboratorErrorKind::UnknownDevice {
            device: device_id.to_string(),
        },
    }
}

fn not_capture(device_id: &str) -> ServerError {
    ServerError::Collaborator {
        kind: CollaboratorErrorKind::WrongDeviceKind {
            device: device_id.to_string(),
            expected: DeviceKind::Capture.to_string(),
        },
    }
}

fn find<'a>(devices: &'a [DeviceState], device_id: &str) -> Result<&'a DeviceState, ServerError> {
    devices
        .iter()
        .find(|d| d.id == device_id)
        .ok_or_else(|| unknown_device(device_id))
}

fn find_mut<'a>(
    devices: &'a mut [DeviceState],
    device_id: &str,
) -> Result<&'a mut DeviceState, ServerError> {
    devices
        .iter_mut()
        .find(|d| d.id == device_id)
        .ok_or_else(|| unknown_device(device_id))
}

fn capture<'a>(
    devices: &'a [DeviceState],
    device_id: &str,
) -> Result<&'a DeviceState, ServerError> {
    let device = find(devices, device_id)?;
    if device.kind != DeviceKind::Capture {
        return Err(not_capture(device_id));
    }
    Ok(device)
}

fn capture_mut<'a>(
    devices: &'a mut [DeviceState],
    device_id: &str,
) -> Result<&'a mut DeviceState, ServerError> {
    let device = find_mut(devices, device_id)?;
    if device.kind != DeviceKind::Capture {
        return Err(not_capture(device_id));
    }
    Ok(device)
}
