//! Incident records for device health transitions.
//!
//! An incident is a persisted record of a connectivity transition that
//! requires operator attention. At most one open incident per device is
//! intended; deduplication lives in the health crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::{DeviceClass, DeviceId, DeviceStatus};

/// Unique identifier for an incident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentId(pub Uuid);

impl IncidentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incident lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IncidentStatus {
    /// Newly created, awaiting operator action
    #[default]
    New,
    /// Handled and closed
    Processed,
}

impl IncidentStatus {
    /// Get the status as the persisted string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processed => "processed",
        }
    }

    /// Check whether the incident is still open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::New)
    }
}

/// Incident class derived from the device status that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentClass {
    /// Raised by a connected transition
    Active,
    /// Raised by a disconnected transition
    Deactive,
}

impl IncidentClass {
    /// Derive the class from a device status.
    pub fn from_status(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Connected => Self::Active,
            DeviceStatus::Disconnected => Self::Deactive,
        }
    }

    /// Get the class as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Deactive => "Deactive",
        }
    }
}

/// Incident severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Severity {
    /// Informational - no action required
    Info = 0,
    /// Warning - potential issue
    #[default]
    Warning = 1,
    /// Critical - action required
    Critical = 2,
}

impl Severity {
    /// Get the severity as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// A persisted device health incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Unique incident identifier
    pub id: IncidentId,
    /// Class of the device that raised the incident
    pub device_class: DeviceClass,
    /// Device that raised the incident
    pub device_id: DeviceId,
    /// Transition that raised the incident
    pub event_type: DeviceStatus,
    /// Operator-facing event label
    pub event_name: String,
    /// Lifecycle status
    pub status: IncidentStatus,
    /// Derived incident class
    pub class: IncidentClass,
    /// Device location at creation time
    pub location: String,
    /// Severity
    pub severity: Severity,
    /// Originating subsystem
    pub source: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl IncidentRecord {
    /// Create a new open incident for a device transition.
    pub fn new(device_class: DeviceClass, device_id: impl Into<DeviceId>, event: DeviceStatus) -> Self {
        Self {
            id: IncidentId::new(),
            device_class,
            device_id: device_id.into(),
            event_type: event,
            event_name: event.event_label().to_string(),
            status: IncidentStatus::New,
            class: IncidentClass::from_status(event),
            location: String::new(),
            severity: Severity::Warning,
            source: "health".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Set the device location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the originating subsystem.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Check whether the incident is still open.
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_from_status() {
        assert_eq!(
            IncidentClass::from_status(DeviceStatus::Connected),
            IncidentClass::Active
        );
        assert_eq!(
            IncidentClass::from_status(DeviceStatus::Disconnected),
            IncidentClass::Deactive
        );
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(IncidentStatus::New.as_str(), "NEW");
        assert_eq!(IncidentStatus::Processed.as_str(), "processed");
        assert!(IncidentStatus::New.is_open());
        assert!(!IncidentStatus::Processed.is_open());
    }

    #[test]
    fn test_new_incident_defaults() {
        let incident =
            IncidentRecord::new(DeviceClass::Camera, "cam-1", DeviceStatus::Disconnected);

        assert!(incident.is_open());
        assert_eq!(incident.class, IncidentClass::Deactive);
        assert_eq!(incident.event_name, "Thiết bị mất kết nối");
        assert_eq!(incident.severity, Severity::Warning);
    }
}
