//! Core domain types and boundary traits for the Vantage video platform.
//!
//! Provides:
//! - Device health records and status enums
//! - Incident and AI detection records
//! - Store traits over the external relational collaborator
//! - Notification channel traits
//! - Interval scheduler for maintenance jobs

pub mod detection;
pub mod device;
pub mod error;
pub mod incident;
pub mod notify;
pub mod schedule;
pub mod store;

// Re-exports
pub use device::{DeviceClass, DeviceConnection, DeviceHealthRecord, DeviceStatus};

pub use incident::{IncidentClass, IncidentId, IncidentRecord, IncidentStatus, Severity};

pub use detection::DetectionRecord;

pub use error::{NotifyError, StoreError};

pub use store::{
    DetectionStore, DeviceStore, IncidentStore, MemoryDetectionStore, MemoryDeviceStore,
    MemoryIncidentStore,
};

pub use notify::{ConsoleNotifier, FailingNotifier, MemoryNotifier, Notification, Notifier};

pub use schedule::Scheduler;
