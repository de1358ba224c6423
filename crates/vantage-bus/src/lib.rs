//! Message-bus boundary for the Vantage platform.
//!
//! Provides:
//! - The `MessageBus` trait (publish / per-consumer blocking receive)
//! - Fixed topic names shared with the edge agents
//! - An in-process bus for tests and embedded deployments
//! - An MQTT adapter (feature `mqtt`)

pub mod bus;
pub mod memory;
pub mod topics;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-exports
pub use bus::{BusError, BusMessage, MessageBus};

pub use memory::MemoryBus;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBus, MqttConfig};
