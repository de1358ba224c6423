//! Device health records and status types.
//!
//! A device is a camera, an NVR, or an aggregating smart unit. Each carries
//! a binary connectivity status and the timestamp of its last liveness
//! report. Records are owned by the external CRUD layer; this core only
//! mutates status and ping columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device identifier.
pub type DeviceId = String;

/// Owning box identifier (the parent aggregation unit a camera or NVR is
/// registered under).
pub type BoxId = String;

/// Device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// IP camera
    Camera,
    /// Network video recorder
    Nvr,
    /// Aggregating smart unit
    SmartDevice,
}

impl DeviceClass {
    /// Get the class as a wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Nvr => "nvr",
            Self::SmartDevice => "smart_device",
        }
    }

    /// Get the class from a wire string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "camera" => Some(Self::Camera),
            "nvr" => Some(Self::Nvr),
            "smart_device" | "smartdevice" => Some(Self::SmartDevice),
            _ => None,
        }
    }

    /// Get the operator-facing display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::Nvr => "Đầu ghi",
            Self::SmartDevice => "Thiết bị thông minh",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Device connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Device is reachable
    Connected,
    /// Device is unreachable
    Disconnected,
}

impl DeviceStatus {
    /// Map a boolean liveness signal to a status.
    pub fn from_liveness(alive: bool) -> Self {
        if alive {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    /// Get the status as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }

    /// Get the operator-facing event label.
    pub fn event_label(&self) -> &'static str {
        match self {
            Self::Connected => "Thiết bị kết nối",
            Self::Disconnected => "Thiết bị mất kết nối",
        }
    }

    /// Check if this status represents a reachable device.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection parameters for an edge unit, carried in resync payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConnection {
    /// Device address (IP or hostname)
    pub address: String,
    /// Control port
    pub port: u16,
    /// RTSP port, when distinct from the control port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtsp_port: Option<u16>,
    /// Access username
    pub username: String,
    /// Access password
    pub password: String,
    /// Channel index on the owning box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
}

impl DeviceConnection {
    /// Create a new connection block.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    /// Set access credentials.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the channel index.
    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Set the RTSP port.
    pub fn with_rtsp_port(mut self, port: u16) -> Self {
        self.rtsp_port = Some(port);
        self
    }
}

/// Persisted health state of a single device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHealthRecord {
    /// Unique device identifier
    pub device_id: DeviceId,
    /// Device class
    pub class: DeviceClass,
    /// Current connectivity status
    pub status: DeviceStatus,
    /// When the device last reported liveness (None = never)
    pub last_ping: Option<DateTime<Utc>>,
    /// Owning box, when the device is registered under one
    pub box_id: Option<BoxId>,
    /// Human-readable name
    pub display_name: String,
    /// Installation location
    pub location: String,
    /// Connection parameters for resync payloads
    pub connection: DeviceConnection,
}

impl DeviceHealthRecord {
    /// Create a new record in the disconnected, never-pinged state.
    pub fn new(device_id: impl Into<DeviceId>, class: DeviceClass) -> Self {
        Self {
            device_id: device_id.into(),
            class,
            status: DeviceStatus::Disconnected,
            last_ping: None,
            box_id: None,
            display_name: String::new(),
            location: String::new(),
            connection: DeviceConnection::default(),
        }
    }

    /// Set the owning box.
    pub fn with_box(mut self, box_id: impl Into<BoxId>) -> Self {
        self.box_id = Some(box_id.into());
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the connection parameters.
    pub fn with_connection(mut self, connection: DeviceConnection) -> Self {
        self.connection = connection;
        self
    }

    /// Set the current status.
    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the last ping timestamp.
    pub fn with_last_ping(mut self, at: DateTime<Utc>) -> Self {
        self.last_ping = Some(at);
        self
    }

    /// Elapsed time since the last ping, or None if the device never pinged.
    pub fn silence(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_ping.map(|t| now - t)
    }

    /// Check whether the device has been silent longer than `window`.
    pub fn is_stale(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        match self.last_ping {
            Some(t) => now - t > window,
            None => false,
        }
    }
}
