//! Incident deduplication.
//!
//! Decides whether a status transition warrants a new incident record or an
//! update to the existing open one. The decision table mirrors the legacy
//! behavior exactly, including the case where an open Deactive incident is
//! not closed by a connected report; see DESIGN.md before changing it.

use std::sync::Arc;

use vantage_core::device::{DeviceHealthRecord, DeviceStatus};
use vantage_core::incident::{IncidentClass, IncidentId, IncidentRecord};
use vantage_core::notify::Notifier;
use vantage_core::store::IncidentStore;

use crate::HealthError;

/// Result of running the decision table for one transition.
#[derive(Debug, Clone)]
pub enum IncidentOutcome {
    /// A new open incident was created.
    Created(IncidentRecord),
    /// The existing open incident was closed.
    Closed(IncidentId),
    /// No incident change was warranted.
    Unchanged,
}

impl IncidentOutcome {
    /// Whether the transition changed incident state.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Deduplicating incident writer.
pub struct IncidentDeduplicator {
    incidents: Arc<dyn IncidentStore>,
    notifier: Arc<dyn Notifier>,
}

impl IncidentDeduplicator {
    /// Create a deduplicator over an incident store and a notifier.
    pub fn new(incidents: Arc<dyn IncidentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            incidents,
            notifier,
        }
    }

    /// Apply the decision table to a device transition.
    ///
    /// | open incident | event | action |
    /// |---|---|---|
    /// | none | disconnected | create, notify |
    /// | none | connected | no-op |
    /// | class differs | disconnected | create, notify |
    /// | class Active | connected | close, notify |
    /// | same class | unchanged | no-op |
    pub async fn record_transition(
        &self,
        device: &DeviceHealthRecord,
        event: DeviceStatus,
    ) -> Result<IncidentOutcome, HealthError> {
        let new_class = IncidentClass::from_status(event);
        let open = self.incidents.open_for_device(&device.device_id).await?;

        let outcome = match open {
            None => {
                if event == DeviceStatus::Disconnected {
                    let incident = self.create_incident(device, event).await?;
                    IncidentOutcome::Created(incident)
                } else {
                    IncidentOutcome::Unchanged
                }
            }
            Some(open) => {
                if open.class != new_class && event == DeviceStatus::Disconnected {
                    let incident = self.create_incident(device, event).await?;
                    IncidentOutcome::Created(incident)
                } else if open.class == IncidentClass::Active && event == DeviceStatus::Connected
                {
                    self.incidents.close(&open.id, event).await?;
                    self.notify(device, event).await;
                    IncidentOutcome::Closed(open.id)
                } else {
                    IncidentOutcome::Unchanged
                }
            }
        };

        Ok(outcome)
    }

    async fn create_incident(
        &self,
        device: &DeviceHealthRecord,
        event: DeviceStatus,
    ) -> Result<IncidentRecord, HealthError> {
        let incident = IncidentRecord::new(device.class, device.device_id.clone(), event)
            .with_location(device.location.clone());
        self.incidents.create(incident.clone()).await?;
        self.notify(device, event).await;
        Ok(incident)
    }

    /// Best-effort notification fan-out. Failures are logged, never
    /// retried, never propagated.
    async fn notify(&self, device: &DeviceHealthRecord, event: DeviceStatus) {
        let payload = serde_json::json!({
            "device_id": device.device_id,
            "device_class": device.class.as_str(),
            "status": event.as_str(),
            "event_name": event.event_label(),
            "location": device.location,
        });

        if let Err(e) = self
            .notifier
            .send_notify("ui", "device/incident", payload)
            .await
        {
            tracing::warn!(device = %device.device_id, error = %e, "ui notification failed");
        }

        let name = if device.display_name.is_empty() {
            device.device_id.as_str()
        } else {
            device.display_name.as_str()
        };
        if let Err(e) = self
            .notifier
            .notify_external(name, event.event_label(), device.class.display_name())
            .await
        {
            tracing::warn!(device = %device.device_id, error = %e, "external alert failed");
        }
    }
}
