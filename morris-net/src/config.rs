//! Connection tuning

use morris_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Latency probe interval while synchronized
    pub keepalive_interval_ms: u64,
    /// Fixed wait between host reconnect attempts
    pub reconnect_backoff_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_ms: 5000,
            reconnect_backoff_ms: 2000,
            max_reconnect_attempts: 5,
        }
    }
}

impl NetConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: NetConfig = serde_json::from_str(&content)?;
        if config.keepalive_interval_ms == 0 {
            return Err(ConfigError::Invalid("keepalive_interval_ms must be positive".to_string()));
        }
        Ok(config)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_partial() {
        let config: NetConfig = serde_json::from_str(r#"{"max_reconnect_attempts": 2}"#).unwrap();
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.keepalive_interval(), Duration::from_secs(5));
        assert_eq!(config.reconnect_backoff(), Duration::from_secs(2));
    }
}
