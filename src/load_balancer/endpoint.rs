//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single backend address
//! - Provide the breaker isolation key
//! - Provide a metrics-safe path segment

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Error returned when an endpoint string cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("invalid endpoint '{input}': {source}")]
    Invalid {
        input: String,
        #[source]
        source: url::ParseError,
    },
    #[error("endpoint '{0}' has no host")]
    MissingHost(String),
}

/// A single backend address.
///
/// Two endpoints are equal when their normalized URLs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parse `host:port` (http assumed) or a full URL.
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let trimmed = input.trim();
        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let url = Url::parse(&candidate).map_err(|source| EndpointError::Invalid {
            input: input.to_string(),
            source,
        })?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(EndpointError::MissingHost(input.to_string()));
        }

        Ok(Self { url })
    }

    /// The underlying URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Isolation key used for the circuit breaker.
    pub fn key(&self) -> &str {
        self.url.as_str()
    }

    /// `host_port` with characters unsafe in a metrics path replaced by `_`.
    pub fn metric_segment(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        let raw = match self.url.port_or_known_default() {
            Some(port) => format!("{}_{}", host, port),
            None => host.to_string(),
        };

        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.url.into()
    }
}

impl From<Url> for Endpoint {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
