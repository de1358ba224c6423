//! Correlation registry linking outbound commands to inbound responses.
//!
//! The inbound consumer loop writes responses with [`CorrelationRegistry::put`];
//! the dispatcher blocks on [`CorrelationRegistry::wait_for`]. Waiting is
//! notification-based rather than a poll ticker, so a response wakes its
//! caller immediately while the timeout contract stays the same.
//!
//! Entries are consumed on delivery. Responses that arrive after the caller
//! gave up (or that never had a caller) are orphaned and reclaimed by
//! [`CorrelationRegistry::sweep_expired`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Notify;

/// Default time an unconsumed entry may live before the sweep removes it.
pub const DEFAULT_ENTRY_TTL_SECS: i64 = 600;

/// Correlation wait errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

struct CorrelationSlot {
    response: Option<serde_json::Value>,
    received_at: Option<DateTime<Utc>>,
    notify: Arc<Notify>,
    created_at: DateTime<Utc>,
}

impl CorrelationSlot {
    fn new() -> Self {
        Self {
            response: None,
            received_at: None,
            notify: Arc::new(Notify::new()),
            created_at: Utc::now(),
        }
    }
}

/// Concurrent store of in-flight command correlations.
///
/// Owned by the service root and shared by reference between the dispatcher
/// and the inbound router; safe for concurrent use from the consumer loop
/// and any number of waiting callers.
pub struct CorrelationRegistry {
    slots: DashMap<String, CorrelationSlot>,
    entry_ttl: chrono::Duration,
}

impl CorrelationRegistry {
    /// Create a registry with the default entry TTL.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            entry_ttl: chrono::Duration::seconds(DEFAULT_ENTRY_TTL_SECS),
        }
    }

    /// Create a registry with a custom entry TTL.
    pub fn with_entry_ttl(ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            entry_ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_ENTRY_TTL_SECS)),
        }
    }

    /// Register a correlation ID before publishing its command.
    ///
    /// Registering first closes the window where a response could arrive
    /// before the caller starts waiting.
    pub fn register(&self, correlation_id: &str) {
        self.slots
            .insert(correlation_id.to_string(), CorrelationSlot::new());
    }

    /// Drop a registration whose command never made it onto the bus.
    pub fn abandon(&self, correlation_id: &str) {
        self.slots.remove(correlation_id);
    }

    /// Store the response for a correlation ID and wake its waiter.
    ///
    /// The last write for a given ID wins. A response with no registered
    /// waiter still creates an entry; the sweep reclaims it.
    pub fn put(&self, correlation_id: &str, response: serde_json::Value) {
        let mut slot = self
            .slots
            .entry(correlation_id.to_string())
            .or_insert_with(CorrelationSlot::new);
        slot.response = Some(response);
        slot.received_at = Some(Utc::now());
        slot.notify.notify_one();
    }

    /// Block until a response for `correlation_id` arrives or `timeout`
    /// elapses. Consumes and removes the entry on delivery.
    pub async fn wait_for(
        &self,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, CorrelationError> {
        let notify = {
            let slot = self
                .slots
                .entry(correlation_id.to_string())
                .or_insert_with(CorrelationSlot::new);
            slot.notify.clone()
        };

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(response) = self.try_consume(correlation_id) {
                return Ok(response);
            }

            if tokio::time::timeout_at(deadline, notify.notified())
                .await
                .is_err()
            {
                return Err(CorrelationError::Timeout(timeout));
            }
        }
    }

    /// Take the response for an ID if one is present, removing the entry.
    fn try_consume(&self, correlation_id: &str) -> Option<serde_json::Value> {
        let response = {
            let mut slot = self.slots.get_mut(correlation_id)?;
            slot.response.take()?
        };
        self.slots.remove(correlation_id);
        Some(response)
    }

    /// Remove entries older than the TTL, counted from the response
    /// arrival when one was observed. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - self.entry_ttl;
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| slot.received_at.unwrap_or(slot.created_at) > cutoff);
        before - self.slots.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_wait() {
        let registry = CorrelationRegistry::new();
        registry.register("c1");
        registry.put("c1", serde_json::json!({"ok": 1}));

        let response = registry
            .wait_for("c1", Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(response["ok"], 1);
        // Consumed on delivery.
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_wait_then_put() {
        let registry = Arc::new(CorrelationRegistry::new());
        registry.register("c1");

        let r = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            r.put("c1", serde_json::json!({"delayed": true}));
        });

        let started = tokio::time::Instant::now();
        let response = registry
            .wait_for("c1", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response["delayed"], true);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_timeout_fires_on_deadline() {
        let registry = CorrelationRegistry::new();
        registry.register("c1");

        let started = tokio::time::Instant::now();
        let err = registry
            .wait_for("c1", Duration::from_millis(120))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, CorrelationError::Timeout(_)));
        assert!(elapsed >= Duration::from_millis(120));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_no_cross_delivery() {
        let registry = Arc::new(CorrelationRegistry::new());
        registry.register("a");
        registry.register("b");

        let r = registry.clone();
        tokio::spawn(async move {
            r.put("b", serde_json::json!("for-b"));
            tokio::time::sleep(Duration::from_millis(30)).await;
            r.put("a", serde_json::json!("for-a"));
        });

        let (ra, rb) = tokio::join!(
            registry.wait_for("a", Duration::from_secs(5)),
            registry.wait_for("b", Duration::from_secs(5)),
        );
        assert_eq!(ra.unwrap(), serde_json::json!("for-a"));
        assert_eq!(rb.unwrap(), serde_json::json!("for-b"));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = CorrelationRegistry::new();
        registry.register("c1");
        registry.put("c1", serde_json::json!(1));
        registry.put("c1", serde_json::json!(2));

        let response = registry
            .wait_for("c1", Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(response, serde_json::json!(2));
    }

    #[tokio::test]
    async fn test_orphan_sweep() {
        let registry = CorrelationRegistry::with_entry_ttl(Duration::from_millis(10));
        registry.put("orphan", serde_json::json!({}));
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(registry.sweep_expired(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_entries() {
        let registry = CorrelationRegistry::new();
        registry.register("fresh");
        assert_eq!(registry.sweep_expired(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_abandon() {
        let registry = CorrelationRegistry::new();
        registry.register("c1");
        registry.abandon("c1");
        assert!(registry.is_empty());
    }
}
