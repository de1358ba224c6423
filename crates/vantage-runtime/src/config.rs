//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Consumer name used on the bus.
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Maintenance sweep cadence in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_consumer_name() -> String {
    "vantage-backend".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            consumer_name: default_consumer_name(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl ServiceConfig {
    /// Set the consumer name.
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = name.into();
        self
    }

    /// Set the sweep cadence.
    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.consumer_name, "vantage-backend");
        assert_eq!(config.sweep_interval_secs, 300);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.sweep_interval_secs, 300);
    }
}
