//! Notification channels.
//!
//! Both operations are best-effort: the health pipeline logs failures and
//! never retries them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::NotifyError;

/// A captured notification, kept by the memory channel for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Push to connected UI clients.
    Push {
        channel: String,
        topic: String,
        payload: String,
    },
    /// External operator alert (chat bot).
    External {
        device_name: String,
        event_label: String,
        device_kind: String,
    },
}

/// Outbound notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push a payload to connected UI clients.
    async fn send_notify(
        &self,
        channel: &str,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError>;

    /// Send an operator alert through the external chat channel.
    async fn notify_external(
        &self,
        device_name: &str,
        event_label: &str,
        device_kind: &str,
    ) -> Result<(), NotifyError>;
}

/// Notifier that writes to the tracing log.
#[derive(Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_notify(
        &self,
        channel: &str,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(channel, topic, %payload, "ui notification");
        Ok(())
    }

    async fn notify_external(
        &self,
        device_name: &str,
        event_label: &str,
        device_kind: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(device_name, event_label, device_kind, "external alert");
        Ok(())
    }
}

/// Notifier that records everything in memory, for tests.
#[derive(Default, Clone)]
pub struct MemoryNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications sent so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    /// Number of notifications sent so far.
    pub async fn len(&self) -> usize {
        self.sent.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sent.read().await.is_empty()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_notify(
        &self,
        channel: &str,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.sent.write().await.push(Notification::Push {
            channel: channel.to_string(),
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn notify_external(
        &self,
        device_name: &str,
        event_label: &str,
        device_kind: &str,
    ) -> Result<(), NotifyError> {
        self.sent.write().await.push(Notification::External {
            device_name: device_name.to_string(),
            event_label: event_label.to_string(),
            device_kind: device_kind.to_string(),
        });
        Ok(())
    }
}

/// Notifier that always fails, for failure-path tests.
#[derive(Default)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_notify(
        &self,
        _channel: &str,
        _topic: &str,
        _payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("failing notifier".to_string()))
    }

    async fn notify_external(
        &self,
        _device_name: &str,
        _event_label: &str,
        _device_kind: &str,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("failing notifier".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_notifier_records() {
        let notifier = MemoryNotifier::new();
        notifier
            .send_notify("ui", "device/health", serde_json::json!({"ok": true}))
            .await
            .unwrap();
        notifier
            .notify_external("Cam cổng", "Thiết bị mất kết nối", "Camera")
            .await
            .unwrap();

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Notification::Push { .. }));
        assert!(matches!(sent[1], Notification::External { .. }));
    }
}
