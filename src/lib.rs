//! Load balancing dispatch client.
//!
//! Sends caller supplied work to one of several interchangeable endpoints,
//! with per-endpoint circuit breaking, bounded retries across endpoints and
//! per-endpoint metrics.

pub mod config;
pub mod dispatch;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::{ClientConfig, StatsConfig};
pub use dispatch::{AttemptError, Client, ClientError, Outcome};
pub use load_balancer::{Endpoint, Random, RoundRobin, SelectionError, Strategy};
pub use observability::metrics::Stats;
pub use resilience::{
    BackoffStrategy, BreakerError, CircuitBreaker, CircuitRegistry, CircuitSettings,
    ConstantBackoff, ExponentialBackoff, WorkError,
};
pub use tokio_util::sync::CancellationToken;
