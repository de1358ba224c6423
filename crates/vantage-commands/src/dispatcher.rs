//! Command dispatcher.
//!
//! Builds the command envelope, publishes it to the outbound command topic
//! and blocks the calling task until the correlated response arrives or the
//! deadline fires. The wait runs on the caller's task, never on the
//! consumer loop; a timeout is surfaced as a distinct error naming the
//! command and is never retried here.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vantage_bus::{MessageBus, topics};

use crate::command::{CommandEnvelope, CommandKind, TargetDevice};
use crate::correlation::{CorrelationError, CorrelationRegistry};

/// Command dispatch errors.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("device did not answer {command} within {timeout:?}")]
    DeviceTimeout {
        command: String,
        timeout: Duration,
    },

    #[error("failed to encode command: {0}")]
    Encode(String),

    #[error("failed to publish command: {0}")]
    Publish(String),
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Outbound command topic.
    #[serde(default = "default_command_topic")]
    pub command_topic: String,

    /// Deadline for simple config commands.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Deadline for commands expecting a rich payload.
    #[serde(default = "default_extended_timeout_secs")]
    pub extended_timeout_secs: u64,
}

fn default_command_topic() -> String {
    topics::COMMAND_REQUEST.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_extended_timeout_secs() -> u64 {
    30
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            command_topic: default_command_topic(),
            default_timeout_secs: default_timeout_secs(),
            extended_timeout_secs: default_extended_timeout_secs(),
        }
    }
}

impl DispatcherConfig {
    /// Deadline for a command kind.
    pub fn timeout_for(&self, kind: CommandKind) -> Duration {
        if kind.expects_rich_payload() {
            Duration::from_secs(self.extended_timeout_secs)
        } else {
            Duration::from_secs(self.default_timeout_secs)
        }
    }
}

/// Publishes commands and waits for their correlated responses.
pub struct CommandDispatcher {
    bus: Arc<dyn MessageBus>,
    registry: Arc<CorrelationRegistry>,
    config: DispatcherConfig,
}

impl CommandDispatcher {
    /// Create a dispatcher with the default configuration.
    pub fn new(bus: Arc<dyn MessageBus>, registry: Arc<CorrelationRegistry>) -> Self {
        Self {
            bus,
            registry,
            config: DispatcherConfig::default(),
        }
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Send a command and block until its response or the per-kind deadline.
    pub async fn dispatch(
        &self,
        kind: CommandKind,
        target: TargetDevice,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CommandError> {
        let envelope = CommandEnvelope::new(kind, target, params);
        self.dispatch_envelope(envelope, self.config.timeout_for(kind))
            .await
    }

    /// Send a command with a caller-supplied correlation ID.
    pub async fn dispatch_with_id(
        &self,
        correlation_id: impl Into<String>,
        kind: CommandKind,
        target: TargetDevice,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CommandError> {
        let envelope =
            CommandEnvelope::new(kind, target, params).with_command_id(correlation_id);
        self.dispatch_envelope(envelope, self.config.timeout_for(kind))
            .await
    }

    /// Send a command with an explicit deadline.
    pub async fn dispatch_with_timeout(
        &self,
        kind: CommandKind,
        target: TargetDevice,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, CommandError> {
        let envelope = CommandEnvelope::new(kind, target, params);
        self.dispatch_envelope(envelope, timeout).await
    }

    /// Publish an envelope without waiting for a response.
    pub async fn send(&self, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        let payload =
            serde_json::to_vec(envelope).map_err(|e| CommandError::Encode(e.to_string()))?;
        self.bus
            .publish(&self.config.command_topic, payload)
            .await
            .map_err(|e| CommandError::Publish(e.to_string()))
    }

    async fn dispatch_envelope(
        &self,
        envelope: CommandEnvelope,
        timeout: Duration,
    ) -> Result<serde_json::Value, CommandError> {
        let correlation_id = envelope.command_id.clone();
        let payload =
            serde_json::to_vec(&envelope).map_err(|e| CommandError::Encode(e.to_string()))?;

        self.registry.register(&correlation_id);

        if let Err(e) = self.bus.publish(&self.config.command_topic, payload).await {
            self.registry.abandon(&correlation_id);
            return Err(CommandError::Publish(e.to_string()));
        }

        tracing::debug!(
            command = %envelope.cmd,
            correlation_id = %correlation_id,
            device = %envelope.device.device_id,
            "command published, waiting for response"
        );

        match self.registry.wait_for(&correlation_id, timeout).await {
            Ok(response) => Ok(response),
            Err(CorrelationError::Timeout(timeout)) => {
                tracing::warn!(
                    command = %envelope.cmd,
                    correlation_id = %correlation_id,
                    ?timeout,
                    "command timed out"
                );
                Err(CommandError::DeviceTimeout {
                    command: envelope.cmd,
                    timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_bus::MemoryBus;
    use vantage_core::device::DeviceConnection;

    fn target() -> TargetDevice {
        TargetDevice::new(
            "cam-1",
            DeviceConnection::new("10.0.0.5", 8000).with_auth("admin", "secret"),
        )
    }

    fn harness() -> (Arc<MemoryBus>, Arc<CorrelationRegistry>, CommandDispatcher) {
        let bus = Arc::new(MemoryBus::new());
        let registry = Arc::new(CorrelationRegistry::new());
        let dispatcher = CommandDispatcher::new(bus.clone(), registry.clone());
        (bus, registry, dispatcher)
    }

    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let (bus, registry, dispatcher) = harness();
        bus.register_consumer("edge", &[topics::COMMAND_REQUEST])
            .await;

        // Simulated edge agent: read the command, answer through the
        // registry the way the inbound router would.
        let edge_bus = bus.clone();
        let edge_registry = registry.clone();
        tokio::spawn(async move {
            let message = edge_bus.receive("edge").await.unwrap();
            let envelope: CommandEnvelope =
                serde_json::from_slice(&message.payload).unwrap();
            assert_eq!(envelope.cmd, "get_networkconfig");
            edge_registry.put(
                &envelope.command_id,
                serde_json::json!({"dhcp": false, "address": "10.0.0.5"}),
            );
        });

        let response = dispatcher
            .dispatch(
                CommandKind::GetNetworkConfig,
                target(),
                serde_json::json!({}),
            )
            .await
            .unwrap();
        assert_eq!(response["dhcp"], false);
    }

    #[tokio::test]
    async fn test_dispatch_timeout_names_command() {
        let (_bus, _registry, dispatcher) = harness();

        let err = dispatcher
            .dispatch_with_timeout(
                CommandKind::Ping,
                target(),
                serde_json::json!({}),
                Duration::from_millis(80),
            )
            .await
            .unwrap_err();

        match err {
            CommandError::DeviceTimeout { command, .. } => assert_eq!(command, "ping"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_do_not_cross() {
        let (bus, registry, _) = harness();
        bus.register_consumer("edge", &[topics::COMMAND_REQUEST])
            .await;
        let dispatcher = Arc::new(CommandDispatcher::new(bus.clone(), registry.clone()));

        let edge_bus = bus.clone();
        let edge_registry = registry.clone();
        tokio::spawn(async move {
            for _ in 0..2 {
                let message = edge_bus.receive("edge").await.unwrap();
                let envelope: CommandEnvelope =
                    serde_json::from_slice(&message.payload).unwrap();
                edge_registry.put(
                    &envelope.command_id,
                    serde_json::json!({"echo": envelope.cmd}),
                );
            }
        });

        let d1 = dispatcher.clone();
        let d2 = dispatcher.clone();
        let (a, b) = tokio::join!(
            d1.dispatch(CommandKind::GetOsdConfig, target(), serde_json::json!({})),
            d2.dispatch(CommandKind::GetImageConfig, target(), serde_json::json!({})),
        );

        assert_eq!(a.unwrap()["echo"], "get_osdconfig");
        assert_eq!(b.unwrap()["echo"], "get_imageconfig");
    }

    #[tokio::test]
    async fn test_dispatch_with_caller_supplied_id() {
        let (bus, registry, dispatcher) = harness();
        bus.register_consumer("edge", &[topics::COMMAND_REQUEST])
            .await;

        let edge_bus = bus.clone();
        let edge_registry = registry.clone();
        tokio::spawn(async move {
            let message = edge_bus.receive("edge").await.unwrap();
            let envelope: CommandEnvelope =
                serde_json::from_slice(&message.payload).unwrap();
            assert_eq!(envelope.command_id, "req-42");
            edge_registry.put("req-42", serde_json::json!({"pong": true}));
        });

        let response = dispatcher
            .dispatch_with_id("req-42", CommandKind::Ping, target(), serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(response["pong"], true);
    }

    #[tokio::test]
    async fn test_timeout_selection_by_kind() {
        let config = DispatcherConfig::default();
        assert_eq!(
            config.timeout_for(CommandKind::GetNetworkConfig),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.timeout_for(CommandKind::ScanDevice),
            Duration::from_secs(30)
        );
    }
}
