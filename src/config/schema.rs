//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::load_balancer::Endpoint;
use crate::resilience::circuit_breaker::{
    CircuitSettings, DEFAULT_ERROR_PERCENT_THRESHOLD, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_SLEEP_WINDOW, DEFAULT_TIMEOUT, DEFAULT_VOLUME_THRESHOLD,
};

/// Root configuration for a dispatch client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long one attempt may run, in milliseconds.
    pub timeout_ms: u64,

    /// Maximum attempts in flight per endpoint.
    pub max_concurrent_requests: usize,

    /// Error percentage at which an endpoint's circuit opens.
    pub error_percent_threshold: u8,

    /// Minimum requests in the rolling window before the circuit may open.
    pub default_volume_threshold: u32,

    /// How long an open circuit waits before letting a probe through, in milliseconds.
    pub sleep_window_ms: u64,

    /// Retries after the first attempt. Unset means one pass over the pool.
    pub retries: Option<u32>,

    /// Base delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,

    /// Endpoints handed to the load balancing strategy.
    pub endpoints: Vec<Endpoint>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Metrics settings.
    pub stats: StatsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            error_percent_threshold: DEFAULT_ERROR_PERCENT_THRESHOLD,
            default_volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            sleep_window_ms: DEFAULT_SLEEP_WINDOW.as_millis() as u64,
            retries: None,
            retry_delay_ms: 100,
            endpoints: Vec::new(),
            log_level: "info".to_string(),
            stats: StatsConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn sleep_window(&self) -> Duration {
        Duration::from_millis(self.sleep_window_ms)
    }

    /// Breaker isolation parameters applied to every endpoint.
    pub fn circuit_settings(&self) -> CircuitSettings {
        CircuitSettings {
            timeout: self.timeout(),
            max_concurrent_requests: self.max_concurrent_requests,
            error_percent_threshold: self.error_percent_threshold,
            request_volume_threshold: self.default_volume_threshold,
            sleep_window: self.sleep_window(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Register the `metrics` facade sink on client construction.
    pub enabled: bool,

    /// Bind address of the metrics exporter.
    pub server: String,

    /// Prefix of every bucket name.
    pub prefix: String,

    /// Tags attached to every sample (`key:value` or bare).
    pub tags: Vec<String>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: "0.0.0.0:9090".to_string(),
            prefix: String::new(),
            tags: Vec::new(),
        }
    }
}
