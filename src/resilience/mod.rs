//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch call:
//!     → backoff.rs (retry count + base delay → wait schedule)
//!     → retries.rs (drive attempts through the schedule)
//!     → per attempt: circuit_breaker.rs (admission, concurrency, failure tracking)
//!         → timeouts.rs (bound the work, honour cancellation)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Breaker state is per endpoint key, never global
//! - Fail fast while open; a single probe once the sleep window passes
//! - Schedules are plain data so any driver can consume them

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::{BackoffStrategy, ConstantBackoff, ExponentialBackoff};
pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitRegistry, CircuitSettings, CircuitState, WorkError,
};
pub use retries::{Retrier, Retryable};
