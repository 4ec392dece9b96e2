//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Client::dispatch(work)
//!     → BackoffStrategy::create (retries, delay → schedule)
//!     → Retrier::run, per attempt:
//!         → Strategy::next_endpoint
//!         → stats: {endpoint}.called, timer started
//!         → CircuitBreaker::execute(endpoint key, work(endpoint))
//!         → Outcome::of(signal) → stats: {endpoint}.{outcome}
//!         → failure appended to ClientError, sleep, next attempt
//!     → Ok(()) on first success, ClientError with every failure otherwise
//! ```
//!
//! # Design Decisions
//! - Each call owns its error list and retry state; nothing per-call is shared
//! - Success after retries is indistinguishable from immediate success
//! - An empty pool fails the call at once, it is never retried

pub mod client;
pub mod error;

pub use client::Client;
pub use error::{AttemptError, ClientError, Outcome};
