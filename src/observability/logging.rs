//! Structured logging.
//!
//! Uses the tracing crate. The level comes from config, `RUST_LOG` wins when
//! set.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_subscriber::util::TryInitError;

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed, which callers can ignore.
pub fn init_logging(level: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("replica_dispatch={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
