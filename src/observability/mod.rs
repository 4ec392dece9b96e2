//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every dispatch attempt produces:
//!     → logging.rs (structured tracing events inside a `dispatch` span)
//!     → metrics.rs (called / outcome counters, timing sample)
//!         → fan-out to every registered Stats sink
//!         → MetricsStats bridges into the `metrics` facade (Prometheus)
//! ```
//!
//! # Design Decisions
//! - Metrics are best effort: a sink can never fail a dispatch
//! - Bucket names are `{prefix}.{endpoint}.{suffix}`
//! - Sinks are registered before traffic; reads are lock-free

pub mod logging;
pub mod metrics;
