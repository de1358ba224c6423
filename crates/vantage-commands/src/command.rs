//! Command kinds and wire envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vantage_core::device::{DeviceConnection, DeviceId};

/// Commands the backend can issue to an edge agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Probe the network for devices
    ScanDevice,
    /// Read network configuration
    GetNetworkConfig,
    /// Write network configuration
    SetNetworkConfig,
    /// Read video stream configuration
    GetVideoConfig,
    /// Write video stream configuration
    SetVideoConfig,
    /// Read on-screen display configuration
    GetOsdConfig,
    /// Write on-screen display configuration
    SetOsdConfig,
    /// Read image configuration
    GetImageConfig,
    /// Write image configuration
    SetImageConfig,
    /// Change device credentials
    ChangePassword,
    /// Liveness probe
    Ping,
    /// Download a recorded clip
    DownloadClip,
    /// Extract a clip segment
    ExtractClip,
    /// Register a camera on an NVR
    AddCamera,
    /// Remove a camera from an NVR
    RemoveCamera,
    /// Push a firmware update
    UpdateOta,
    /// Apply/refresh a unit's configuration
    SyncConfig,
}

impl CommandKind {
    /// Get the wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanDevice => "scan_device",
            Self::GetNetworkConfig => "get_networkconfig",
            Self::SetNetworkConfig => "set_networkconfig",
            Self::GetVideoConfig => "get_videoconfig",
            Self::SetVideoConfig => "set_videoconfig",
            Self::GetOsdConfig => "get_osdconfig",
            Self::SetOsdConfig => "set_osdconfig",
            Self::GetImageConfig => "get_imageconfig",
            Self::SetImageConfig => "set_imageconfig",
            Self::ChangePassword => "change_password",
            Self::Ping => "ping",
            Self::DownloadClip => "download_clip",
            Self::ExtractClip => "extract_clip",
            Self::AddCamera => "add_camera",
            Self::RemoveCamera => "remove_camera",
            Self::UpdateOta => "update_ota",
            Self::SyncConfig => "sync_config",
        }
    }

    /// Get a command kind from its wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scan_device" => Some(Self::ScanDevice),
            "get_networkconfig" => Some(Self::GetNetworkConfig),
            "set_networkconfig" => Some(Self::SetNetworkConfig),
            "get_videoconfig" => Some(Self::GetVideoConfig),
            "set_videoconfig" => Some(Self::SetVideoConfig),
            "get_osdconfig" => Some(Self::GetOsdConfig),
            "set_osdconfig" => Some(Self::SetOsdConfig),
            "get_imageconfig" => Some(Self::GetImageConfig),
            "set_imageconfig" => Some(Self::SetImageConfig),
            "change_password" => Some(Self::ChangePassword),
            "ping" => Some(Self::Ping),
            "download_clip" => Some(Self::DownloadClip),
            "extract_clip" => Some(Self::ExtractClip),
            "add_camera" => Some(Self::AddCamera),
            "remove_camera" => Some(Self::RemoveCamera),
            "update_ota" => Some(Self::UpdateOta),
            "sync_config" => Some(Self::SyncConfig),
            _ => None,
        }
    }

    /// Whether the response carries a rich payload and gets the extended
    /// deadline.
    pub fn expects_rich_payload(&self) -> bool {
        matches!(
            self,
            Self::ScanDevice | Self::DownloadClip | Self::ExtractClip | Self::UpdateOta
        )
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target of a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDevice {
    /// Device identifier
    pub device_id: DeviceId,
    /// Connection parameters
    #[serde(flatten)]
    pub connection: DeviceConnection,
}

impl TargetDevice {
    /// Create a new target.
    pub fn new(device_id: impl Into<DeviceId>, connection: DeviceConnection) -> Self {
        Self {
            device_id: device_id.into(),
            connection,
        }
    }
}

/// Outbound command envelope, immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Correlation ID linking the response back to the caller
    pub command_id: String,
    /// Wire name of the command
    pub cmd: String,
    /// Issue timestamp (RFC3339)
    pub event_time: DateTime<Utc>,
    /// Target device
    pub device: TargetDevice,
    /// Protocol-specific parameters
    #[serde(default)]
    pub params: serde_json::Value,
}

impl CommandEnvelope {
    /// Create an envelope with a fresh correlation ID.
    pub fn new(kind: CommandKind, device: TargetDevice, params: serde_json::Value) -> Self {
        Self {
            command_id: Uuid::new_v4().to_string(),
            cmd: kind.as_str().to_string(),
            event_time: Utc::now(),
            device,
            params,
        }
    }

    /// Use a caller-supplied correlation ID.
    pub fn with_command_id(mut self, command_id: impl Into<String>) -> Self {
        self.command_id = command_id.into();
        self
    }

    /// Get the command kind, when the wire name is known.
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_str(&self.cmd)
    }
}

/// Inbound command response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Correlation ID of the command this answers
    pub command_id: String,
    /// Whether the edge agent reports success
    #[serde(default = "default_success")]
    pub success: bool,
    /// Response payload
    #[serde(default)]
    pub data: serde_json::Value,
}

fn default_success() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            CommandKind::ScanDevice,
            CommandKind::GetNetworkConfig,
            CommandKind::ChangePassword,
            CommandKind::SyncConfig,
        ] {
            assert_eq!(CommandKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(CommandKind::from_str("reboot_universe"), None);
    }

    #[test]
    fn test_rich_payload_kinds() {
        assert!(CommandKind::ScanDevice.expects_rich_payload());
        assert!(CommandKind::DownloadClip.expects_rich_payload());
        assert!(!CommandKind::Ping.expects_rich_payload());
        assert!(!CommandKind::GetNetworkConfig.expects_rich_payload());
    }

    #[test]
    fn test_envelope_serialization() {
        let target = TargetDevice::new(
            "cam-1",
            DeviceConnection::new("10.0.0.5", 8000).with_auth("admin", "secret"),
        );
        let envelope = CommandEnvelope::new(
            CommandKind::GetNetworkConfig,
            target,
            serde_json::json!({"iface": "eth0"}),
        );

        let json: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&envelope).unwrap()).unwrap();
        assert_eq!(json["cmd"], "get_networkconfig");
        assert_eq!(json["device"]["device_id"], "cam-1");
        assert_eq!(json["device"]["address"], "10.0.0.5");
        assert_eq!(json["params"]["iface"], "eth0");
        // chrono serializes DateTime<Utc> as RFC3339
        assert!(json["event_time"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_response_defaults() {
        let response: CommandResponse =
            serde_json::from_str(r#"{"command_id": "abc"}"#).unwrap();
        assert!(response.success);
        assert!(response.data.is_null());
    }
}
