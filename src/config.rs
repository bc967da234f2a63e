//! Configuration module for the depth replica

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ReplicaError, Result};

/// Binance accepts depth snapshot limits up to 5000
const MAX_SNAPSHOT_LIMIT: u32 = 5000;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Trading symbol to replicate (e.g., "BTCUSDT")
    pub symbol: String,

    /// WebSocket endpoint for Binance raw streams
    pub ws_endpoint: String,

    /// REST API endpoint for snapshots
    pub rest_endpoint: String,

    /// Depth limit requested with each snapshot
    pub snapshot_limit: u32,

    /// Snapshot settings
    pub snapshot_timeout_ms: u64,
    pub snapshot_max_attempts: u32,

    /// Reconnection settings
    pub reconnect_delay_ms: u64,
    pub max_backoff_ms: u64,
    pub max_reconnect_attempts: u32,

    /// Seconds without a message before the stream is probed with a ping
    pub recv_timeout_secs: u64,

    /// Consecutive undecodable diffs tolerated before giving up
    pub max_protocol_errors: u32,

    /// Top-of-book report interval in seconds
    pub report_interval_secs: u64,

    /// Port for the health/metrics HTTP server
    pub health_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            symbol: env::var("SYMBOL")
                .map(|s| s.trim().to_uppercase())
                .unwrap_or(defaults.symbol),
            ws_endpoint: env::var("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            rest_endpoint: env::var("REST_ENDPOINT").unwrap_or(defaults.rest_endpoint),
            snapshot_limit: env_or("SNAPSHOT_LIMIT", defaults.snapshot_limit)?,
            snapshot_timeout_ms: env_or("SNAPSHOT_TIMEOUT_MS", defaults.snapshot_timeout_ms)?,
            snapshot_max_attempts: env_or("SNAPSHOT_MAX_ATTEMPTS", defaults.snapshot_max_attempts)?,
            reconnect_delay_ms: env_or("RECONNECT_DELAY_MS", defaults.reconnect_delay_ms)?,
            max_backoff_ms: env_or("MAX_BACKOFF_MS", defaults.max_backoff_ms)?,
            max_reconnect_attempts: env_or(
                "MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            )?,
            recv_timeout_secs: env_or("RECV_TIMEOUT_SECS", defaults.recv_timeout_secs)?,
            max_protocol_errors: env_or("MAX_PROTOCOL_ERRORS", defaults.max_protocol_errors)?,
            report_interval_secs: env_or("REPORT_INTERVAL_SECS", defaults.report_interval_secs)?,
            health_port: env_or("HEALTH_PORT", defaults.health_port)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the replica cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() {
            return Err(ReplicaError::Config("symbol must not be empty".to_string()));
        }
        if self.snapshot_limit == 0 || self.snapshot_limit > MAX_SNAPSHOT_LIMIT {
            return Err(ReplicaError::Config(format!(
                "snapshot limit must be within 1..={}, got {}",
                MAX_SNAPSHOT_LIMIT, self.snapshot_limit
            )));
        }
        if self.snapshot_max_attempts == 0 {
            return Err(ReplicaError::Config(
                "snapshot_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ReplicaError::Config(
                "max_reconnect_attempts must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("snapshot_timeout_ms", self.snapshot_timeout_ms),
            ("recv_timeout_secs", self.recv_timeout_secs),
            ("report_interval_secs", self.report_interval_secs),
        ] {
            if value == 0 {
                return Err(ReplicaError::Config(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    /// URL of the raw diff stream for the configured symbol
    pub fn stream_url(&self) -> String {
        format!(
            "{}/{}@depth",
            self.ws_endpoint.trim_end_matches('/'),
            self.symbol.to_lowercase()
        )
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            ws_endpoint: "wss://stream.binance.com:9443/ws".to_string(),
            rest_endpoint: "https://api.binance.com/api/v3".to_string(),
            snapshot_limit: 1000,
            snapshot_timeout_ms: 10_000,
            snapshot_max_attempts: 5,
            reconnect_delay_ms: 1000,
            max_backoff_ms: 60_000,
            max_reconnect_attempts: 10,
            recv_timeout_secs: 45,
            max_protocol_errors: 5,
            report_interval_secs: 5,
            health_port: 9090,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ReplicaError::Config(format!("invalid value for {}: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.snapshot_limit, 1000);
    }

    #[test]
    fn test_stream_url_lowercases_symbol() {
        let config = Config {
            ws_endpoint: "wss://stream.binance.com:9443/ws/".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.stream_url(),
            "wss://stream.binance.com:9443/ws/btcusdt@depth"
        );
    }

    #[test]
    fn test_validate_rejects_bad_limit() {
        let config = Config {
            snapshot_limit: 6000,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ReplicaError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_report_interval() {
        let config = Config {
            report_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ReplicaError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_recv_timeout() {
        let config = Config {
            recv_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ReplicaError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_snapshot_timeout() {
        let config = Config {
            snapshot_timeout_ms: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ReplicaError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_symbol() {
        let config = Config {
            symbol: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_or_parses_and_falls_back() {
        env::set_var("DEPTH_SYNC_TEST_LIMIT", " 250 ");
        assert_eq!(env_or("DEPTH_SYNC_TEST_LIMIT", 1000u32).unwrap(), 250);

        env::set_var("DEPTH_SYNC_TEST_BAD", "abc");
        assert!(env_or("DEPTH_SYNC_TEST_BAD", 1u32).is_err());

        assert_eq!(env_or("DEPTH_SYNC_TEST_UNSET", 7u64).unwrap(), 7);
    }
}
