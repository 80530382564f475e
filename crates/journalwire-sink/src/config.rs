//! Sink configuration
//!
//! Two knobs govern a sink's network behavior:
//!
//! - **min_buffer_size**: capacity of the reusable receive buffer, also
//!   applied as the socket's receive-buffer hint.
//! - **reconnect_delay**: how long to wait between connection attempts
//!   while the source is unreachable.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Receive buffer capacity in bytes (default: 256 KiB)
    #[serde(default = "default_min_buffer_size")]
    pub min_buffer_size: usize,

    /// Delay between reconnection attempts (default: 500ms)
    #[serde(default = "default_reconnect_delay", with = "duration_ms")]
    pub reconnect_delay: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            min_buffer_size: default_min_buffer_size(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

fn default_min_buffer_size() -> usize {
    256 * 1024 // 256 KiB
}

fn default_reconnect_delay() -> Duration {
    Duration::from_millis(500)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SinkConfig::default();
        assert_eq!(config.min_buffer_size, 256 * 1024);
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = SinkConfig {
            min_buffer_size: 4096,
            reconnect_delay: Duration::from_millis(25),
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let back: SinkConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.min_buffer_size, 4096);
        assert_eq!(back.reconnect_delay, Duration::from_millis(25));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SinkConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config.min_buffer_size, 256 * 1024);
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_reconnect_delay_serializes_as_millis() {
        let config = SinkConfig {
            min_buffer_size: 1024,
            reconnect_delay: Duration::from_secs(2),
        };
        let value: serde_json::Value = serde_json::to_value(&config).expect("to_value");
        assert_eq!(value["reconnect_delay"], 2000);
    }
}
