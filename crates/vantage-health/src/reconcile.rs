//! Reconciliation: per-box configuration resync and detection dedup.
//!
//! Resync pushes one `sync_config` command per unit registered under an
//! owning box so the edge agent re-applies its configuration. A failure on
//! one unit never aborts the remaining units.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use vantage_bus::{MessageBus, topics};
use vantage_commands::command::{CommandEnvelope, CommandKind, TargetDevice};
use vantage_core::device::DeviceStatus;
use vantage_core::store::{DetectionStore, DeviceStore};

use crate::HealthError;

/// Reconciler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Outbound command topic for resync commands.
    #[serde(default = "default_command_topic")]
    pub command_topic: String,

    /// Window inside which two detections of the same kind from the same
    /// camera count as duplicates.
    #[serde(default = "default_dup_window_secs")]
    pub dup_window_secs: i64,
}

fn default_command_topic() -> String {
    topics::COMMAND_REQUEST.to_string()
}

fn default_dup_window_secs() -> i64 {
    300
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            command_topic: default_command_topic(),
            dup_window_secs: default_dup_window_secs(),
        }
    }
}

/// Configuration resync and AI-event maintenance.
pub struct Reconciler {
    devices: Arc<dyn DeviceStore>,
    detections: Arc<dyn DetectionStore>,
    bus: Arc<dyn MessageBus>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a reconciler with the default configuration.
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        detections: Arc<dyn DetectionStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            devices,
            detections,
            bus,
            config: ReconcilerConfig::default(),
        }
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Resynchronize every unit registered under `box_id`.
    ///
    /// Marks the box reachable, then publishes one configuration command
    /// per unit. Returns the number of commands published.
    pub async fn resync_box(&self, box_id: &str) -> Result<usize, HealthError> {
        match self.devices.read_by_id(box_id).await? {
            Some(_) => {
                if let Err(e) = self
                    .devices
                    .update_status(box_id, DeviceStatus::Connected)
                    .await
                {
                    tracing::warn!(box_id, error = %e, "failed to mark box reachable");
                }
            }
            None => {
                tracing::warn!(box_id, "owning box has no device record");
            }
        }

        let units = self.devices.read_by_box(box_id).await?;
        let mut published = 0;

        for unit in units {
            let target = TargetDevice::new(unit.device_id.clone(), unit.connection.clone());
            let envelope = CommandEnvelope::new(
                CommandKind::SyncConfig,
                target,
                serde_json::json!({
                    "box_id": box_id,
                    "channel": unit.connection.channel,
                }),
            );

            let payload = match serde_json::to_vec(&envelope) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(unit = %unit.device_id, error = %e, "resync encode failed");
                    continue;
                }
            };

            match self.bus.publish(&self.config.command_topic, payload).await {
                Ok(()) => published += 1,
                Err(e) => {
                    tracing::warn!(unit = %unit.device_id, error = %e, "resync publish failed");
                }
            }
        }

        tracing::info!(box_id, published, "box resync dispatched");
        Ok(published)
    }

    /// Remove stale duplicate detection records.
    ///
    /// Keeps the newest record per (camera, event type) and removes older
    /// ones captured within the duplicate window of the record kept.
    /// Returns the number of records removed.
    pub async fn dedup_detections(&self) -> Result<usize, HealthError> {
        let window = chrono::Duration::seconds(self.config.dup_window_secs);
        let mut records = self.detections.list_all().await?;
        records.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));

        let mut kept: HashMap<(String, String), chrono::DateTime<Utc>> = HashMap::new();
        let mut removed = 0;

        for record in records {
            let key = (record.device_id.clone(), record.event_type.clone());
            match kept.get(&key) {
                Some(kept_at) if *kept_at - record.captured_at <= window => {
                    if let Err(e) = self.detections.remove(&record.id).await {
                        tracing::warn!(id = %record.id, error = %e, "dedup remove failed");
                        continue;
                    }
                    removed += 1;
                }
                _ => {
                    kept.insert(key, record.captured_at);
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "stale duplicate detections removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vantage_bus::MemoryBus;
    use vantage_core::detection::DetectionRecord;
    use vantage_core::device::{DeviceClass, DeviceConnection, DeviceHealthRecord};
    use vantage_core::store::{MemoryDetectionStore, MemoryDeviceStore};

    async fn seed_box(devices: &MemoryDeviceStore) {
        devices
            .upsert(
                DeviceHealthRecord::new("box-1", DeviceClass::SmartDevice)
                    .with_status(DeviceStatus::Disconnected),
            )
            .await
            .unwrap();
        for i in 1..=3 {
            devices
                .upsert(
                    DeviceHealthRecord::new(format!("cam-{}", i), DeviceClass::Camera)
                        .with_box("box-1")
                        .with_connection(
                            DeviceConnection::new("10.0.0.5", 8000)
                                .with_auth("admin", "secret")
                                .with_channel(i),
                        ),
                )
                .await
                .unwrap();
        }
    }

    fn harness(
        devices: MemoryDeviceStore,
        detections: MemoryDetectionStore,
    ) -> (Arc<MemoryBus>, Reconciler) {
        let bus = Arc::new(MemoryBus::new());
        let reconciler = Reconciler::new(
            Arc::new(devices),
            Arc::new(detections),
            bus.clone(),
        );
        (bus, reconciler)
    }

    #[tokio::test]
    async fn test_resync_publishes_one_command_per_unit() {
        let devices = MemoryDeviceStore::new();
        seed_box(&devices).await;
        let (bus, reconciler) = harness(devices.clone(), MemoryDetectionStore::new());
        bus.register_consumer("edge", &[topics::COMMAND_REQUEST])
            .await;

        let published = reconciler.resync_box("box-1").await.unwrap();
        assert_eq!(published, 3);

        // Box marked reachable.
        let rec = devices.read_by_id("box-1").await.unwrap().unwrap();
        assert_eq!(rec.status, DeviceStatus::Connected);

        for _ in 0..3 {
            let message = bus.receive("edge").await.unwrap();
            let envelope: CommandEnvelope =
                serde_json::from_slice(&message.payload).unwrap();
            assert_eq!(envelope.cmd, "sync_config");
            assert_eq!(envelope.params["box_id"], "box-1");
            assert!(!envelope.device.connection.username.is_empty());
        }
    }

    #[tokio::test]
    async fn test_resync_survives_per_unit_publish_failure() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use vantage_bus::{BusError, BusMessage};

        // Bus that rejects the first publish and accepts the rest.
        struct FlakyBus {
            calls: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl MessageBus for FlakyBus {
            async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), BusError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(BusError::SendFailed("broker unavailable".to_string()))
                } else {
                    Ok(())
                }
            }

            async fn receive(&self, _consumer: &str) -> Result<BusMessage, BusError> {
                Err(BusError::Closed)
            }
        }

        let devices = MemoryDeviceStore::new();
        seed_box(&devices).await;
        let bus = Arc::new(FlakyBus {
            calls: AtomicUsize::new(0),
        });
        let reconciler = Reconciler::new(
            Arc::new(devices),
            Arc::new(MemoryDetectionStore::new()),
            bus.clone(),
        );

        // First unit fails, the remaining two still go out.
        let published = reconciler.resync_box("box-1").await.unwrap();
        assert_eq!(published, 2);
        assert_eq!(bus.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_resync_unknown_box_still_processes_units() {
        let devices = MemoryDeviceStore::new();
        devices
            .upsert(
                DeviceHealthRecord::new("cam-1", DeviceClass::Camera).with_box("ghost-box"),
            )
            .await
            .unwrap();
        let (_bus, reconciler) = harness(devices, MemoryDetectionStore::new());

        let published = reconciler.resync_box("ghost-box").await.unwrap();
        assert_eq!(published, 1);
    }

    #[tokio::test]
    async fn test_dedup_removes_duplicates_keeps_newest() {
        let detections = MemoryDetectionStore::new();
        let now = Utc::now();

        let newest = DetectionRecord::new("cam-1", "intrusion").with_captured_at(now);
        let newest_id = newest.id;
        detections.create(newest).await.unwrap();
        detections
            .create(
                DetectionRecord::new("cam-1", "intrusion")
                    .with_captured_at(now - Duration::minutes(2)),
            )
            .await
            .unwrap();
        detections
            .create(
                DetectionRecord::new("cam-1", "intrusion")
                    .with_captured_at(now - Duration::minutes(4)),
            )
            .await
            .unwrap();
        // Different event type, untouched.
        detections
            .create(DetectionRecord::new("cam-1", "face").with_captured_at(now))
            .await
            .unwrap();
        // Outside the window, untouched.
        detections
            .create(
                DetectionRecord::new("cam-1", "intrusion")
                    .with_captured_at(now - Duration::minutes(30)),
            )
            .await
            .unwrap();

        let (_bus, reconciler) = harness(MemoryDeviceStore::new(), detections.clone());

        let removed = reconciler.dedup_detections().await.unwrap();
        assert_eq!(removed, 2);

        let remaining = detections.list_all().await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().any(|r| r.id == newest_id));
    }
}
