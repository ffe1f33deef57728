// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tracker server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Tracker server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Endpoint to bind (`host:port`, `tcp://host:port`, `*` for all interfaces)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request loop rate (ticks per second)
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: u32,

    /// Poll interval while dispatch is paused (milliseconds)
    #[serde(default = "default_paused_poll")]
    pub paused_poll_ms: u64,

    /// Maximum request/reply size (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Dispatch requests as soon as the loop starts
    #[serde(default = "default_true")]
    pub start_active: bool,

    /// Statistics logging interval in seconds (0 disables)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_endpoint() -> String {
    "tcp://127.0.0.1:7135".to_string()
}

fn default_tick_rate() -> u32 {
    140
}

fn default_paused_poll() -> u64 {
    1000
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_true() -> bool {
    true
}

fn default_stats_interval() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            tick_rate_hz: default_tick_rate(),
            paused_poll_ms: default_paused_poll(),
            max_message_size: default_max_message_size(),
            start_active: true,
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Target period of one loop tick.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    /// Poll interval while paused.
    pub fn paused_poll(&self) -> Duration {
        Duration::from_millis(self.paused_poll_ms)
    }

    /// Address to bind the listener to.
    pub fn bind_address(&self) -> String {
        bind_address(&self.endpoint)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if strip_scheme(&self.endpoint).is_empty() {
            return Err(ConfigError::InvalidValue("endpoint cannot be empty".into()));
        }
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::InvalidValue("tick_rate_hz cannot be 0".into()));
        }
        if self.paused_poll_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "paused_poll_ms cannot be 0".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_message_size cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

fn strip_scheme(endpoint: &str) -> &str {
    endpoint.trim().trim_start_matches("tcp://")
}

/// Socket address to bind for an endpoint string (`*` means all interfaces).
pub fn bind_address(endpoint: &str) -> String {
    let addr = strip_scheme(endpoint);
    match addr.strip_prefix("*:") {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}

/// Socket address to connect to for an endpoint string (`*` means loopback).
pub fn connect_address(endpoint: &str) -> String {
    let addr = strip_scheme(endpoint);
    match addr.strip_prefix("*:") {
        Some(port) => format!("127.0.0.1:{}", port),
        None => addr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.endpoint, "tcp://127.0.0.1:7135");
        assert_eq!(config.tick_rate_hz, 140);
        assert!(config.start_active);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tick_period() {
        let config = ServerConfig::default();
        let period = config.tick_period();
        assert!(period > Duration::from_micros(7142));
        assert!(period < Duration::from_micros(7143));
    }

    #[test]
    fn test_endpoint_addresses() {
        assert_eq!(bind_address("tcp://*:7135"), "0.0.0.0:7135");
        assert_eq!(bind_address("127.0.0.1:9000"), "127.0.0.1:9000");
        assert_eq!(connect_address("tcp://*:7135"), "127.0.0.1:7135");
        assert_eq!(connect_address("tcp://localhost:1"), "localhost:1");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"tick_rate_hz": 90}"#).unwrap();
        assert_eq!(config.tick_rate_hz, 90);
        assert_eq!(config.paused_poll_ms, 1000);
        assert_eq!(config.endpoint, "tcp://127.0.0.1:7135");
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        let config = ServerConfig {
            endpoint: "tcp://*:7200".into(),
            start_active: false,
            ..Default::default()
        };
        config.to_file(&path).unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.endpoint, "tcp://*:7200");
        assert!(!loaded.start_active);
    }

    #[test]
    fn test_missing_file() {
        let err = ServerConfig::from_file(Path::new("/nonexistent/server.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_validation() {
        let zero_rate = ServerConfig {
            tick_rate_hz: 0,
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());

        let empty_endpoint = ServerConfig {
            endpoint: "tcp://".into(),
            ..Default::default()
        };
        assert!(empty_endpoint.validate().is_err());

        let zero_poll = ServerConfig {
            paused_poll_ms: 0,
            ..Default::default()
        };
        assert!(zero_poll.validate().is_err());
    }
}
