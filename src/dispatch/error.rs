//! Dispatch error types.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::load_balancer::SelectionError;
use crate::observability::metrics;
use crate::resilience::{BreakerError, Retryable};

/// Why a single attempt failed.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("timeout")]
    Timeout,
    #[error("circuit open")]
    CircuitOpen,
    #[error("unable to complete request: {0}")]
    UnableToCompleteRequest(#[from] SelectionError),
    #[error("cancelled")]
    Cancelled,
    /// The work function's own error, or a breaker rejection other than the above.
    #[error("{0}")]
    General(Arc<dyn std::error::Error + Send + Sync>),
}

impl Retryable for AttemptError {
    fn is_retryable(&self) -> bool {
        !matches!(self, AttemptError::UnableToCompleteRequest(_) | AttemptError::Cancelled)
    }
}

impl From<BreakerError> for AttemptError {
    fn from(err: BreakerError) -> Self {
        match err {
            BreakerError::Timeout => AttemptError::Timeout,
            BreakerError::CircuitOpen => AttemptError::CircuitOpen,
            BreakerError::Cancelled => AttemptError::Cancelled,
            BreakerError::Work(e) => AttemptError::General(Arc::from(e)),
            other @ BreakerError::MaxConcurrency => AttemptError::General(Arc::new(other)),
        }
    }
}

/// Classified result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout,
    CircuitOpen,
    Error,
}

impl Outcome {
    pub fn of(signal: &Result<(), BreakerError>) -> Self {
        match signal {
            Ok(()) => Outcome::Success,
            Err(BreakerError::Timeout) => Outcome::Timeout,
            Err(BreakerError::CircuitOpen) => Outcome::CircuitOpen,
            Err(_) => Outcome::Error,
        }
    }

    /// Bucket suffix of the outcome counter.
    pub fn suffix(self) -> &'static str {
        match self {
            Outcome::Success => metrics::SUCCESS,
            Outcome::Timeout => metrics::TIMEOUT,
            Outcome::CircuitOpen => metrics::CIRCUIT_OPEN,
            Outcome::Error => metrics::ERROR,
        }
    }
}

/// Every failed attempt of one dispatch call, in attempt order.
#[derive(Debug, Clone, Default)]
pub struct ClientError {
    errors: Vec<AttemptError>,
}

impl ClientError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, err: AttemptError) {
        self.errors.push(err);
    }

    pub fn errors(&self) -> &[AttemptError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The final attempt's error.
    pub fn last(&self) -> Option<&AttemptError> {
        self.errors.last()
    }

    pub fn into_errors(self) -> Vec<AttemptError> {
        self.errors
    }
}

impl From<Vec<AttemptError>> for ClientError {
    fn from(errors: Vec<AttemptError>) -> Self {
        Self { errors }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
