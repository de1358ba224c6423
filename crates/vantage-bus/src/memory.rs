//! In-process message bus.
//!
//! Routes published messages to every registered consumer subscribed to
//! the topic. Used by tests and single-process deployments; the delivery
//! semantics match the external bus boundary (fire-and-forget publish,
//! per-consumer blocking receive).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::bus::{BusError, BusMessage, MessageBus};

struct Subscription {
    topics: Vec<String>,
    tx: mpsc::UnboundedSender<BusMessage>,
}

type Queue = Arc<Mutex<mpsc::UnboundedReceiver<BusMessage>>>;

/// In-process topic bus.
#[derive(Default, Clone)]
pub struct MemoryBus {
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
    queues: Arc<RwLock<HashMap<String, Queue>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer for a set of topics.
    ///
    /// Re-registering a name replaces the previous subscription and drops
    /// any queued messages.
    pub async fn register_consumer(&self, name: &str, topics: &[&str]) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.write().await.insert(
            name.to_string(),
            Subscription {
                topics: topics.iter().map(|t| t.to_string()).collect(),
                tx,
            },
        );
        self.queues
            .write()
            .await
            .insert(name.to_string(), Arc::new(Mutex::new(rx)));
    }

    /// Drop a consumer. A receive blocked on its queue observes the close.
    pub async fn remove_consumer(&self, name: &str) {
        self.subscriptions.write().await.remove(name);
        self.queues.write().await.remove(name);
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let subscriptions = self.subscriptions.read().await;
        for subscription in subscriptions.values() {
            if subscription.topics.iter().any(|t| t == topic) {
                // A dropped queue only means the consumer went away.
                let _ = subscription.tx.send(BusMessage::new(topic, payload.clone()));
            }
        }
        Ok(())
    }

    async fn receive(&self, consumer: &str) -> Result<BusMessage, BusError> {
        let queue = {
            let queues = self.queues.read().await;
            queues
                .get(consumer)
                .cloned()
                .ok_or_else(|| BusError::UnknownConsumer(consumer.to_string()))?
        };

        let mut rx = queue.lock().await;
        rx.recv().await.ok_or(BusError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_routes_by_topic() {
        let bus = MemoryBus::new();
        bus.register_consumer("backend", &["a", "b"]).await;

        bus.publish("a", b"one".to_vec()).await.unwrap();
        bus.publish("c", b"ignored".to_vec()).await.unwrap();
        bus.publish("b", b"two".to_vec()).await.unwrap();

        let first = bus.receive("backend").await.unwrap();
        assert_eq!(first.topic, "a");
        assert_eq!(first.payload, b"one");

        let second = bus.receive("backend").await.unwrap();
        assert_eq!(second.topic, "b");
    }

    #[tokio::test]
    async fn test_unknown_consumer() {
        let bus = MemoryBus::new();
        assert!(matches!(
            bus.receive("nobody").await,
            Err(BusError::UnknownConsumer(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = MemoryBus::new();
        assert!(bus.publish("a", b"x".to_vec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fan_out_to_multiple_consumers() {
        let bus = MemoryBus::new();
        bus.register_consumer("one", &["a"]).await;
        bus.register_consumer("two", &["a"]).await;

        bus.publish("a", b"x".to_vec()).await.unwrap();

        assert_eq!(bus.receive("one").await.unwrap().payload, b"x");
        assert_eq!(bus.receive("two").await.unwrap().payload, b"x");
    }

    #[tokio::test]
    async fn test_remove_consumer_closes_blocked_receive() {
        let bus = MemoryBus::new();
        bus.register_consumer("backend", &["a"]).await;

        let receiver = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.receive("backend").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        bus.remove_consumer("backend").await;

        assert!(matches!(receiver.await.unwrap(), Err(BusError::Closed)));
    }
}
