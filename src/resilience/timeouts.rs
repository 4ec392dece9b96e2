//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap an attempt with its deadline
//! - Stop waiting as soon as the caller cancels
//!
//! The wrapped future is dropped on timeout or cancellation, which releases
//! whatever it was holding.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a bounded wait ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("timed out after {0:?}")]
    Elapsed(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Await `future` for at most `timeout`, or until `cancel` fires.
pub async fn with_deadline<F>(
    timeout: Duration,
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(timeout, future) => res.map_err(|_| Interrupted::Elapsed(timeout)),
    }
}
