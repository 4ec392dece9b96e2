//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, percentages <= 100)
//! - Detect duplicate endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,
    #[error("max_concurrent_requests must be greater than zero")]
    ZeroMaxConcurrentRequests,
    #[error("error_percent_threshold must be at most 100, got {0}")]
    ErrorPercentOutOfRange(u8),
    #[error("stats.server '{0}' is not a socket address")]
    InvalidStatsServer(String),
    #[error("endpoint '{0}' is listed more than once")]
    DuplicateEndpoint(String),
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.max_concurrent_requests == 0 {
        errors.push(ValidationError::ZeroMaxConcurrentRequests);
    }
    if config.error_percent_threshold > 100 {
        errors.push(ValidationError::ErrorPercentOutOfRange(config.error_percent_threshold));
    }
    if config.stats.enabled && config.stats.server.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidStatsServer(config.stats.server.clone()));
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        if !seen.insert(endpoint.key()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
