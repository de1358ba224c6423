//! Store traits over the external relational collaborator.
//!
//! The relational backend itself is out of scope; these traits are the
//! typed rendition of its generic CRUD primitives, and the in-memory
//! implementations back tests and embedded deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::detection::DetectionRecord;
use crate::device::{DeviceClass, DeviceHealthRecord, DeviceStatus};
use crate::error::StoreError;
use crate::incident::{IncidentId, IncidentRecord, IncidentStatus};

/// Device health persistence.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Read a device by its identifier.
    async fn read_by_id(&self, device_id: &str) -> Result<Option<DeviceHealthRecord>, StoreError>;

    /// Read all devices of a class.
    async fn read_by_class(&self, class: DeviceClass)
        -> Result<Vec<DeviceHealthRecord>, StoreError>;

    /// Read all devices registered under an owning box.
    async fn read_by_box(&self, box_id: &str) -> Result<Vec<DeviceHealthRecord>, StoreError>;

    /// List every registered device.
    async fn list_all(&self) -> Result<Vec<DeviceHealthRecord>, StoreError>;

    /// Update the status column of a device.
    async fn update_status(&self, device_id: &str, status: DeviceStatus)
        -> Result<(), StoreError>;

    /// Update the last-ping column of a device.
    async fn update_last_ping(
        &self,
        device_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Create or replace a device record.
    async fn upsert(&self, record: DeviceHealthRecord) -> Result<(), StoreError>;
}

/// Incident persistence.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Create a new incident.
    async fn create(&self, incident: IncidentRecord) -> Result<(), StoreError>;

    /// Read the currently open incident for a device, if any.
    async fn open_for_device(
        &self,
        device_id: &str,
    ) -> Result<Option<IncidentRecord>, StoreError>;

    /// Close an incident, recording the transition that closed it.
    async fn close(&self, id: &IncidentId, event: DeviceStatus) -> Result<(), StoreError>;

    /// List every incident.
    async fn list_all(&self) -> Result<Vec<IncidentRecord>, StoreError>;
}

/// AI detection persistence.
#[async_trait]
pub trait DetectionStore: Send + Sync {
    /// Persist a detection record.
    async fn create(&self, record: DetectionRecord) -> Result<(), StoreError>;

    /// List every detection record.
    async fn list_all(&self) -> Result<Vec<DetectionRecord>, StoreError>;

    /// Remove a detection record.
    async fn remove(&self, id: &uuid::Uuid) -> Result<(), StoreError>;
}

/// In-memory device store.
#[derive(Default, Clone)]
pub struct MemoryDeviceStore {
    devices: Arc<RwLock<HashMap<String, DeviceHealthRecord>>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered devices.
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn read_by_id(&self, device_id: &str) -> Result<Option<DeviceHealthRecord>, StoreError> {
        Ok(self.devices.read().await.get(device_id).cloned())
    }

    async fn read_by_class(
        &self,
        class: DeviceClass,
    ) -> Result<Vec<DeviceHealthRecord>, StoreError> {
        Ok(self
            .devices
            .read()
            .await
            .values()
            .filter(|d| d.class == class)
            .cloned()
            .collect())
    }

    async fn read_by_box(&self, box_id: &str) -> Result<Vec<DeviceHealthRecord>, StoreError> {
        Ok(self
            .devices
            .read()
            .await
            .values()
            .filter(|d| d.box_id.as_deref() == Some(box_id))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<DeviceHealthRecord>, StoreError> {
        Ok(self.devices.read().await.values().cloned().collect())
    }

    async fn update_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
    ) -> Result<(), StoreError> {
        let mut devices = self.devices.write().await;
        let record = devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::NotFound(device_id.to_string()))?;
        record.status = status;
        Ok(())
    }

    async fn update_last_ping(
        &self,
        device_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut devices = self.devices.write().await;
        let record = devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::NotFound(device_id.to_string()))?;
        record.last_ping = Some(at);
        Ok(())
    }

    async fn upsert(&self, record: DeviceHealthRecord) -> Result<(), StoreError> {
        self.devices
            .write()
            .await
            .insert(record.device_id.clone(), record);
        Ok(())
    }
}

/// In-memory incident store.
#[derive(Default, Clone)]
pub struct MemoryIncidentStore {
    incidents: Arc<RwLock<Vec<IncidentRecord>>>,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored incidents.
    pub async fn len(&self) -> usize {
        self.incidents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.incidents.read().await.is_empty()
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn create(&self, incident: IncidentRecord) -> Result<(), StoreError> {
        self.incidents.write().await.push(incident);
        Ok(())
    }

    async fn open_for_device(
        &self,
        device_id: &str,
    ) -> Result<Option<IncidentRecord>, StoreError> {
        Ok(self
            .incidents
            .read()
            .await
            .iter()
            .filter(|i| i.device_id == device_id && i.is_open())
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn close(&self, id: &IncidentId, event: DeviceStatus) -> Result<(), StoreError> {
        let mut incidents = self.incidents.write().await;
        let incident = incidents
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        incident.status = IncidentStatus::Processed;
        incident.event_type = event;
        incident.event_name = event.event_label().to_string();
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<IncidentRecord>, StoreError> {
        Ok(self.incidents.read().await.clone())
    }
}

/// In-memory detection store.
#[derive(Default, Clone)]
pub struct MemoryDetectionStore {
    records: Arc<RwLock<Vec<DetectionRecord>>>,
}

impl MemoryDetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored detections.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DetectionStore for MemoryDetectionStore {
    async fn create(&self, record: DetectionRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<DetectionRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn remove(&self, id: &uuid::Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| &r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
