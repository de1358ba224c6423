//! Health state machine.
//!
//! Turns inbound liveness reports into status transitions, with one
//! handler per device class: cameras and NVRs get the one-hour staleness
//! window and the fleet-wide resync fan-out, the aggregate smart class is
//! eagerly reconciled against a five-minute window on every report.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use vantage_core::device::{DeviceClass, DeviceHealthRecord, DeviceStatus};
use vantage_core::store::DeviceStore;

use crate::HealthError;
use crate::incident::IncidentDeduplicator;
use crate::reconcile::Reconciler;

/// Inbound liveness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessReport {
    /// Class of the reporting device
    pub device_class: DeviceClass,
    /// Reporting device
    pub device_id: String,
    /// Reachability signal
    pub status: bool,
}

/// Health state machine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Silence threshold for cameras and NVRs, in seconds.
    #[serde(default = "default_unit_stale_secs")]
    pub unit_stale_secs: i64,

    /// Silence threshold for the aggregate smart class, in seconds.
    #[serde(default = "default_smart_stale_secs")]
    pub smart_stale_secs: i64,
}

fn default_unit_stale_secs() -> i64 {
    3600
}

fn default_smart_stale_secs() -> i64 {
    300
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unit_stale_secs: default_unit_stale_secs(),
            smart_stale_secs: default_smart_stale_secs(),
        }
    }
}

impl HealthConfig {
    fn unit_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.unit_stale_secs)
    }

    fn smart_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.smart_stale_secs)
    }
}

/// Counters from one staleness sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    /// Devices evaluated.
    pub evaluated: usize,
    /// Boxes resynced.
    pub boxes_resynced: usize,
    /// Devices newly marked disconnected.
    pub disconnected: usize,
}

/// Per-device-class health state machine.
pub struct HealthMonitor {
    devices: Arc<dyn DeviceStore>,
    incidents: IncidentDeduplicator,
    reconciler: Arc<Reconciler>,
    config: HealthConfig,
}

impl HealthMonitor {
    /// Create a monitor with the default staleness windows.
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        incidents: IncidentDeduplicator,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            devices,
            incidents,
            reconciler,
            config: HealthConfig::default(),
        }
    }

    /// Override the staleness windows.
    pub fn with_config(mut self, config: HealthConfig) -> Self {
        self.config = config;
        self
    }

    /// Process one inbound liveness report.
    pub async fn handle_report(&self, report: LivenessReport) -> Result<(), HealthError> {
        match report.device_class {
            DeviceClass::Camera | DeviceClass::Nvr => {
                self.handle_unit_report(report.device_class, &report.device_id, report.status)
                    .await
            }
            DeviceClass::SmartDevice => {
                self.handle_smart_report(&report.device_id).await
            }
        }
    }

    /// Camera/NVR handler: persist the transition, then check whether the
    /// previous silence indicates the whole fleet went stale.
    async fn handle_unit_report(
        &self,
        class: DeviceClass,
        device_id: &str,
        alive: bool,
    ) -> Result<(), HealthError> {
        let Some(record) = self.devices.read_by_id(device_id).await? else {
            tracing::warn!(device_id, "liveness report for unknown device dropped");
            return Ok(());
        };

        let now = Utc::now();
        let status = DeviceStatus::from_liveness(alive);
        let previous_ping = record.last_ping;

        self.devices.update_status(device_id, status).await?;
        if alive || previous_ping.is_none() {
            self.devices.update_last_ping(device_id, now).await?;
        }

        self.incidents.record_transition(&record, status).await?;

        // One stale ping means every sibling may have missed its resync;
        // self-heal the whole fleet, one resync per owning box.
        if record.is_stale(now, self.config.unit_window()) {
            self.resync_fleet(class).await;
        }

        Ok(())
    }

    /// Fan out a resync across every device of `class`, deduplicated per
    /// owning box within this pass.
    async fn resync_fleet(&self, class: DeviceClass) {
        let fleet = match self.devices.read_by_class(class).await {
            Ok(fleet) => fleet,
            Err(e) => {
                tracing::warn!(class = %class, error = %e, "fleet enumeration failed");
                return;
            }
        };

        tracing::info!(class = %class, devices = fleet.len(), "stale ping, resyncing fleet");

        let mut seen_boxes: HashSet<String> = HashSet::new();
        for device in fleet {
            if let Some(box_id) = &device.box_id {
                if seen_boxes.insert(box_id.clone()) {
                    if let Err(e) = self.reconciler.resync_box(box_id).await {
                        tracing::warn!(box_id = %box_id, error = %e, "fleet resync failed for box");
                    }
                }
            }
            if let Err(e) = self
                .devices
                .update_last_ping(&device.device_id, Utc::now())
                .await
            {
                tracing::warn!(device = %device.device_id, error = %e, "ping refresh failed");
            }
        }
    }

    /// Smart-device handler: eagerly reconcile every registered smart
    /// device against the five-minute window, then mark the reporter
    /// connected regardless of the rule.
    async fn handle_smart_report(&self, device_id: &str) -> Result<(), HealthError> {
        let now = Utc::now();
        let window = self.config.smart_window();
        let smart_devices = self.devices.read_by_class(DeviceClass::SmartDevice).await?;

        for device in &smart_devices {
            let fresh = device
                .last_ping
                .is_some_and(|t| now - t <= window);
            let status = DeviceStatus::from_liveness(fresh);
            if let Err(e) = self.apply_transition(device, status).await {
                tracing::warn!(device = %device.device_id, error = %e, "smart reconcile failed");
            }
        }

        match smart_devices.iter().find(|d| d.device_id == device_id) {
            Some(_) => {
                self.devices
                    .update_status(device_id, DeviceStatus::Connected)
                    .await?;
                self.devices.update_last_ping(device_id, now).await?;
            }
            None => {
                tracing::warn!(device_id, "liveness report for unknown smart device dropped");
            }
        }

        Ok(())
    }

    /// Persist a status transition and run the incident table for it.
    async fn apply_transition(
        &self,
        device: &DeviceHealthRecord,
        status: DeviceStatus,
    ) -> Result<(), HealthError> {
        self.devices
            .update_status(&device.device_id, status)
            .await?;
        self.incidents.record_transition(device, status).await?;
        Ok(())
    }

    /// Scheduled staleness sweep.
    ///
    /// Re-evaluates every device independently of push reports, covering
    /// devices that died without sending a disconnect signal. Silent
    /// cameras/NVRs also get their owning box resynced, once per box per
    /// sweep.
    pub async fn sweep_stale(&self) -> SweepStats {
        let now = Utc::now();
        let mut stats = SweepStats::default();

        let all = match self.devices.list_all().await {
            Ok(all) => all,
            Err(e) => {
                tracing::warn!(error = %e, "staleness sweep enumeration failed");
                return stats;
            }
        };

        let mut seen_boxes: HashSet<String> = HashSet::new();
        for device in all {
            stats.evaluated += 1;

            let window = match device.class {
                DeviceClass::Camera | DeviceClass::Nvr => self.config.unit_window(),
                DeviceClass::SmartDevice => self.config.smart_window(),
            };
            if !device.is_stale(now, window) {
                continue;
            }

            if matches!(device.class, DeviceClass::Camera | DeviceClass::Nvr) {
                if let Some(box_id) = &device.box_id {
                    if seen_boxes.insert(box_id.clone()) {
                        match self.reconciler.resync_box(box_id).await {
                            Ok(_) => stats.boxes_resynced += 1,
                            Err(e) => {
                                tracing::warn!(box_id = %box_id, error = %e, "sweep resync failed");
                            }
                        }
                    }
                }
            }

            if device.status.is_connected() {
                match self.apply_transition(&device, DeviceStatus::Disconnected).await {
                    Ok(()) => stats.disconnected += 1,
                    Err(e) => {
                        tracing::warn!(device = %device.device_id, error = %e, "sweep transition failed");
                    }
                }
            }
        }

        tracing::debug!(
            evaluated = stats.evaluated,
            boxes = stats.boxes_resynced,
            disconnected = stats.disconnected,
            "staleness sweep complete"
        );
        stats
    }
}
