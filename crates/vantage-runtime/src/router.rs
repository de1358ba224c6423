//! Inbound event router.
//!
//! One long-lived loop per consumer. Fan-out is strictly by topic: command
//! responses feed the correlation registry, liveness reports feed the
//! health state machine, AI detections are persisted. A malformed payload
//! is logged and dropped; the loop resumes immediately so one bad message
//! never blocks the ones behind it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vantage_bus::{BusError, BusMessage, MessageBus, topics};
use vantage_commands::command::CommandResponse;
use vantage_commands::correlation::CorrelationRegistry;
use vantage_core::detection::DetectionRecord;
use vantage_core::notify::Notifier;
use vantage_core::store::DetectionStore;
use vantage_health::monitor::{HealthMonitor, LivenessReport};

/// Inbound AI detection envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Camera that produced the detection
    pub device_id: String,
    /// Detection type
    pub event_type: String,
    /// Capture timestamp; arrival time is used when absent
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    /// Raw inference payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Single consumer loop fanning inbound messages out by topic.
pub struct InboundRouter {
    bus: Arc<dyn MessageBus>,
    registry: Arc<CorrelationRegistry>,
    monitor: Arc<HealthMonitor>,
    detections: Arc<dyn DetectionStore>,
    notifier: Arc<dyn Notifier>,
}

impl InboundRouter {
    /// Create a router over the shared components.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        registry: Arc<CorrelationRegistry>,
        monitor: Arc<HealthMonitor>,
        detections: Arc<dyn DetectionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bus,
            registry,
            monitor,
            detections,
            notifier,
        }
    }

    /// Run the consumer loop until the bus closes.
    pub async fn run(&self, consumer: &str) {
        tracing::info!(consumer, "inbound consumer loop started");
        loop {
            let message = match self.bus.receive(consumer).await {
                Ok(message) => message,
                Err(BusError::Closed) => {
                    tracing::info!(consumer, "bus closed, consumer loop exiting");
                    break;
                }
                Err(e) => {
                    tracing::error!(consumer, error = %e, "consumer receive failed");
                    break;
                }
            };
            self.route(message).await;
        }
    }

    /// Route one inbound message. Never fails; every error is logged and
    /// confined to this message.
    pub async fn route(&self, message: BusMessage) {
        match message.topic.as_str() {
            topics::COMMAND_RESPONSE => self.route_response(&message),
            topics::DEVICE_HEALTH => self.route_liveness(&message).await,
            topics::AI_EVENT => self.route_detection(&message).await,
            other => {
                tracing::debug!(topic = other, "message on unrouted topic dropped");
            }
        }
    }

    fn route_response(&self, message: &BusMessage) {
        match serde_json::from_slice::<CommandResponse>(&message.payload) {
            Ok(response) => {
                tracing::debug!(correlation_id = %response.command_id, "command response received");
                self.registry.put(&response.command_id, response.data);
            }
            Err(e) => {
                tracing::warn!(error = %e, "undecodable command response dropped");
            }
        }
    }

    async fn route_liveness(&self, message: &BusMessage) {
        match serde_json::from_slice::<LivenessReport>(&message.payload) {
            Ok(report) => {
                if let Err(e) = self.monitor.handle_report(report).await {
                    tracing::warn!(error = %e, "liveness processing failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "undecodable liveness report dropped");
            }
        }
    }

    async fn route_detection(&self, message: &BusMessage) {
        let event = match serde_json::from_slice::<DetectionEvent>(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable detection event dropped");
                return;
            }
        };

        let record = DetectionRecord::new(event.device_id.clone(), event.event_type.clone())
            .with_captured_at(event.captured_at.unwrap_or(message.received_at))
            .with_payload(event.payload);

        if let Err(e) = self.detections.create(record).await {
            tracing::warn!(device = %event.device_id, error = %e, "detection persist failed");
            return;
        }

        let payload = serde_json::json!({
            "device_id": event.device_id,
            "event_type": event.event_type,
        });
        if let Err(e) = self.notifier.send_notify("ui", "ai/event", payload).await {
            tracing::warn!(error = %e, "detection push failed");
        }
    }
}
