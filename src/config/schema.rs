//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::config::duration::serde_human;
use crate::registry::ServiceDescriptor;

/// Root configuration for the resilient client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Command engine settings (admission control, breaker keying).
    pub engine: EngineConfig,

    /// Circuit breaker thresholds.
    pub breaker: BreakerConfig,

    /// Delays between retry attempts.
    pub retry: RetryConfig,

    /// Command result cache.
    pub cache: CacheConfig,

    /// Request collapsing.
    pub collapser: CollapserConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Statically known service instances.
    pub services: Vec<ServiceDescriptor>,
}

/// How commands are mapped onto circuit breakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStrategy {
    /// One breaker shared by every command run through an engine.
    UniquePerContext,
    /// One breaker per command name.
    #[default]
    UniquePerCommand,
}

/// Command engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of commands executing at once.
    pub allowed_concurrency: usize,

    /// Breaker keying strategy.
    pub breaker_strategy: BreakerStrategy,

    /// Worker threads of the engine runtime (0 = CPU count + 1).
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allowed_concurrency: 100,
            breaker_strategy: BreakerStrategy::default(),
            worker_threads: 0,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Requests needed in the window before the error rate is evaluated.
    pub request_volume_threshold: u64,

    /// Error percentage (0-100) at which the circuit opens.
    pub error_threshold_percentage: f64,

    /// Length of the rolling statistics window.
    #[serde(with = "serde_human")]
    pub metrics_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            request_volume_threshold: 1,
            error_threshold_percentage: 50.0,
            metrics_window: Duration::from_secs(10),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Delay between attempts when backoff is disabled.
    pub fixed_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 10,
            max_delay_ms: 30_000,
            fixed_delay_ms: 10,
        }
    }
}

/// Command cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Entries expire this long after their last access.
    #[serde(with = "serde_human")]
    pub retention: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retention: Duration::from_secs(600),
        }
    }
}

/// Request collapser configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollapserConfig {
    pub enabled: bool,

    /// Flush period.
    #[serde(with = "serde_human")]
    pub every: Duration,
}

impl Default for CollapserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            every: Duration::from_millis(10),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.allowed_concurrency, 100);
        assert_eq!(config.engine.breaker_strategy, BreakerStrategy::UniquePerCommand);
        assert_eq!(config.breaker.request_volume_threshold, 1);
        assert_eq!(config.breaker.metrics_window, Duration::from_secs(10));
        assert!(!config.cache.enabled);
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_parses_full_config() {
        let raw = r#"
            [engine]
            allowed_concurrency = 5
            breaker_strategy = "unique_per_context"

            [breaker]
            error_threshold_percentage = 75.0
            metrics_window = "30 sec"

            [cache]
            enabled = true
            retention = "2 min"

            [collapser]
            enabled = true
            every = "25 millis"

            [[services]]
            uid = "users-1"
            name = "users"
            url = "http://127.0.0.1:9000"
            roles = ["read"]
            version = "1.0"

            [services.metadata]
            zone = "eu"
        "#;
        let config: ClientConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.engine.allowed_concurrency, 5);
        assert_eq!(config.engine.breaker_strategy, BreakerStrategy::UniquePerContext);
        assert_eq!(config.breaker.error_threshold_percentage, 75.0);
        assert_eq!(config.breaker.metrics_window, Duration::from_secs(30));
        assert_eq!(config.cache.retention, Duration::from_secs(120));
        assert_eq!(config.collapser.every, Duration::from_millis(25));

        let service = &config.services[0];
        assert_eq!(service.uid, "users-1");
        assert_eq!(service.version.as_deref(), Some("1.0"));
        assert_eq!(service.metadata.get("zone").map(String::as_str), Some("eu"));
    }

    #[test]
    fn test_serialized_defaults_parse_back() {
        let encoded = serde_json::to_string(&ClientConfig::default()).unwrap();
        let decoded: ClientConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.collapser.every, Duration::from_millis(10));
        assert_eq!(decoded.cache.retention, Duration::from_secs(600));
    }
}
