//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! ClientConfig.endpoints
//!     → Strategy::set_endpoints (pool.rs swaps the pool atomically)
//!
//! Each dispatch attempt:
//!     → Strategy::next_endpoint
//!         - round_robin.rs (rotate through the pool)
//!         - random.rs (uniform pick)
//!     → Endpoint handed to the work function and used as breaker key
//! ```
//!
//! # Design Decisions
//! - Strategies own their pool; the pool is replaced wholesale, never edited
//! - Readers always see a complete pool (snapshot via `Arc`)
//! - An empty pool is an explicit error, not an index fault
//! - No affinity across retries: every attempt asks for a fresh endpoint

pub mod endpoint;
pub mod pool;
pub mod random;
pub mod round_robin;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use endpoint::{Endpoint, EndpointError};
pub use pool::EndpointPool;
pub use random::Random;
pub use round_robin::RoundRobin;

/// Selection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no endpoints configured")]
    NoEndpoints,
}

/// A load balancing policy over a pool of endpoints.
///
/// Implementations must be safe to share between concurrent dispatch calls.
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Replace the whole pool.
    fn set_endpoints(&self, endpoints: Vec<Endpoint>);

    /// Snapshot of the current pool.
    fn endpoints(&self) -> Arc<[Endpoint]>;

    /// Current pool size.
    fn len(&self) -> usize {
        self.endpoints().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick the endpoint for the next attempt.
    fn next_endpoint(&self) -> Result<Endpoint, SelectionError>;
}
