//! Client Configuration
//!
//! Tunables for the connection layer. Defaults are suitable for a local
//! server; everything can be overridden programmatically or from the
//! environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a delivery client connection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default deadline for request/response round trips, in milliseconds
    pub request_timeout_ms: u64,

    /// Delay before a reconnection attempt after an unclean close, in
    /// milliseconds
    pub reconnect_delay_ms: u64,

    /// Maximum reconnection attempts (0 = uncapped)
    pub max_reconnect_attempts: u32,

    /// Capacity of the outbound message channel
    pub outbound_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 0,
            outbound_capacity: 100,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `EASEL_REQUEST_TIMEOUT`: request deadline in ms
    /// - `EASEL_RECONNECT_DELAY`: reconnect delay in ms
    /// - `EASEL_RECONNECT_ATTEMPTS`: max reconnect attempts (0 = uncapped)
    /// - `EASEL_OUTBOUND_CAPACITY`: outbound channel capacity
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            request_timeout_ms: std::env::var("EASEL_REQUEST_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
            reconnect_delay_ms: std::env::var("EASEL_RECONNECT_DELAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reconnect_delay_ms),
            max_reconnect_attempts: std::env::var("EASEL_RECONNECT_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_reconnect_attempts),
            outbound_capacity: std::env::var("EASEL_OUTBOUND_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.outbound_capacity),
        }
    }

    /// Default request deadline as a [`Duration`]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reconnect delay as a [`Duration`]
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.reconnect_delay_ms, 1000);
        assert_eq!(config.max_reconnect_attempts, 0);
        assert!(config.outbound_capacity > 0);
    }

    #[test]
    fn test_config_durations() {
        let config = ClientConfig {
            request_timeout_ms: 250,
            reconnect_delay_ms: 50,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_config_serialization() {
        let config = ClientConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.request_timeout_ms, decoded.request_timeout_ms);
        assert_eq!(config.outbound_capacity, decoded.outbound_capacity);
    }
}
