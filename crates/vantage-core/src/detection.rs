//! AI detection records.
//!
//! Detailed detection ingestion is a separate pipeline; this core only
//! persists the record on arrival and removes stale duplicates during the
//! maintenance sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceId;

/// A persisted AI-inference event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Camera that produced the detection
    pub device_id: DeviceId,
    /// Detection type (e.g. "intrusion", "face", "plate")
    pub event_type: String,
    /// When the frame was captured
    pub captured_at: DateTime<Utc>,
    /// Raw inference payload
    pub payload: serde_json::Value,
}

impl DetectionRecord {
    /// Create a new detection record captured now.
    pub fn new(device_id: impl Into<DeviceId>, event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            event_type: event_type.into(),
            captured_at: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    /// Set the capture timestamp.
    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }

    /// Set the inference payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Check whether `other` duplicates this record within `window`.
    ///
    /// Two records duplicate each other when they share a device and event
    /// type and were captured within the window of one another.
    pub fn duplicates(&self, other: &Self, window: chrono::Duration) -> bool {
        self.device_id == other.device_id
            && self.event_type == other.event_type
            && (self.captured_at - other.captured_at).abs() <= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_duplicates_within_window() {
        let now = Utc::now();
        let a = DetectionRecord::new("cam-1", "intrusion").with_captured_at(now);
        let b = DetectionRecord::new("cam-1", "intrusion")
            .with_captured_at(now - Duration::minutes(2));
        let c = DetectionRecord::new("cam-1", "intrusion")
            .with_captured_at(now - Duration::minutes(20));
        let d = DetectionRecord::new("cam-2", "intrusion").with_captured_at(now);

        assert!(a.duplicates(&b, Duration::minutes(5)));
        assert!(!a.duplicates(&c, Duration::minutes(5)));
        assert!(!a.duplicates(&d, Duration::minutes(5)));
    }
}
