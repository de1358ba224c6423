//! MQTT adapter using rumqttc.
//!
//! Thin bridge between the broker and the `MessageBus` boundary: one
//! background task pumps the rumqttc event loop into an in-process queue.
//! Broker-side concerns (sessions, QoS bookkeeping, redelivery) stay with
//! the broker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

use crate::bus::{BusError, BusMessage, MessageBus};

/// MQTT adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address.
    pub broker: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,

    /// Inbound queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    1000
}

impl MqttConfig {
    /// Create a new MQTT configuration.
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
            queue_capacity: default_queue_capacity(),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set authentication.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the client ID.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// MQTT-backed message bus.
pub struct MqttBus {
    client: AsyncClient,
    inbound: Arc<Mutex<mpsc::Receiver<BusMessage>>>,
}

impl MqttBus {
    /// Connect to the broker and subscribe to `topics`.
    ///
    /// Spawns the event-loop pump; the task lives for the life of the
    /// process, reconnecting through rumqttc's own poll cycle.
    pub async fn connect(config: MqttConfig, topics: &[&str]) -> Result<Self, BusError> {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| "vantage-backend".to_string());

        let mut options = MqttOptions::new(client_id, config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive));
        if let (Some(user), Some(pass)) = (config.username.clone(), config.password.clone()) {
            options.set_credentials(user, pass);
        }

        let (client, mut event_loop) = AsyncClient::new(options, config.queue_capacity);
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        for topic in topics {
            client
                .subscribe(*topic, QoS::AtLeastOnce)
                .await
                .map_err(|e| BusError::SendFailed(format!("subscribe {}: {}", topic, e)))?;
        }

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message =
                            BusMessage::new(publish.topic.clone(), publish.payload.to_vec());
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "mqtt event loop error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            inbound: Arc::new(Mutex::new(rx)),
        })
    }
}

#[async_trait]
impl MessageBus for MqttBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| BusError::SendFailed(e.to_string()))
    }

    async fn receive(&self, _consumer: &str) -> Result<BusMessage, BusError> {
        let mut rx = self.inbound.lock().await;
        rx.recv().await.ok_or(BusError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MqttConfig::new("broker.local");
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive, 60);
        assert!(config.client_id.is_none());
    }

    #[test]
    fn test_config_builders() {
        let config = MqttConfig::new("broker.local")
            .with_port(8883)
            .with_auth("vms", "secret")
            .with_client_id("backend-1");

        assert_eq!(config.port, 8883);
        assert_eq!(config.username.as_deref(), Some("vms"));
        assert_eq!(config.client_id.as_deref(), Some("backend-1"));
    }
}
