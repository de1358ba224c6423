//! Message-bus trait and message envelope.
//!
//! The raw bus client (partitioning, offsets, delivery guarantees) is an
//! external collaborator; this trait is its boundary. At-least-once
//! redelivery is assumed to be handled by the bus itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A message received from the bus.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// When the adapter received the message.
    pub received_at: DateTime<Utc>,
}

impl BusMessage {
    /// Create a message received now.
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Message-bus adapter errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("not connected")]
    NotConnected,

    #[error("unknown consumer: {0}")]
    UnknownConsumer(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("bus closed")]
    Closed,
}

/// Message-bus adapter.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Block until the next message for `consumer` arrives.
    async fn receive(&self, consumer: &str) -> Result<BusMessage, BusError>;
}
