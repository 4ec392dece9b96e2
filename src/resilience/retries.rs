//! Retry driver.
//!
//! # Responsibilities
//! - Run an operation once, then once per entry of a wait schedule
//! - Stop on success, on a non-retryable failure, or on cancellation
//! - Hand back every failure, in attempt order

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Decides whether a failure is worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Drives attempts through a precomputed wait schedule.
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    backoff: Vec<Duration>,
}

impl Retrier {
    pub fn new(backoff: Vec<Duration>) -> Self {
        Self { backoff }
    }

    /// Maximum number of attempts this retrier will make.
    pub fn max_attempts(&self) -> usize {
        self.backoff.len() + 1
    }

    /// Run `operation` until it succeeds or the schedule is exhausted.
    ///
    /// On failure the returned vector holds one entry per attempt made.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, Vec<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let mut failures = Vec::with_capacity(self.max_attempts());
        let mut delays = self.backoff.iter();

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retryable = error.is_retryable();
            failures.push(error);
            if !retryable {
                return Err(failures);
            }

            let Some(delay) = delays.next() else {
                return Err(failures);
            };

            tracing::debug!(attempt = failures.len(), delay = ?delay, "Retrying after failure");
            tokio::select! {
                _ = cancel.cancelled() => return Err(failures),
                _ = tokio::time::sleep(*delay) => {}
            }
        }
    }
}
