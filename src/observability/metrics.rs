//! Dispatch metrics.
//!
//! # Responsibilities
//! - Define the sink interface every metrics backend implements
//! - Name buckets per endpoint and outcome
//! - Fan every sample out to all registered sinks
//! - Bridge into the `metrics` facade and expose it for Prometheus scraping
//!
//! # Metrics
//! - `{prefix}.{endpoint}.called` (counter): attempts dispatched, admitted or not
//! - `{prefix}.{endpoint}.timing` (timing): wall clock per attempt
//! - `{prefix}.{endpoint}.success|timeout|circuitopen|error` (counter): outcomes

use arc_swap::ArcSwap;
use metrics::Label;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::StatsConfig;

pub const CALLED: &str = "called";
pub const TIMING: &str = "timing";
pub const SUCCESS: &str = "success";
pub const TIMEOUT: &str = "timeout";
pub const CIRCUIT_OPEN: &str = "circuitopen";
pub const ERROR: &str = "error";

const SAMPLE_RATE: f32 = 1.0;

/// A metrics backend.
pub trait Stats: Send + Sync {
    fn increment(&self, bucket: &str, tags: &[String], sample_rate: f32);
    fn timing(&self, bucket: &str, tags: &[String], duration: Duration, sample_rate: f32);
}

/// Build `{prefix}.{segment}.{suffix}`, dropping an empty prefix.
pub fn bucket_name(prefix: &str, segment: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        format!("{}.{}", segment, suffix)
    } else {
        format!("{}.{}.{}", prefix, segment, suffix)
    }
}

/// Fans dispatch metrics out to every registered sink.
pub struct StatsRecorder {
    prefix: String,
    tags: Vec<String>,
    sinks: ArcSwap<Vec<Arc<dyn Stats>>>,
}

impl StatsRecorder {
    pub fn new(prefix: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            tags,
            sinks: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Add a sink. Every later sample reaches it.
    pub fn register(&self, sink: Arc<dyn Stats>) {
        self.sinks.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(sink.clone());
            next
        });
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.load().len()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn increment(&self, segment: &str, suffix: &str) {
        let sinks = self.sinks.load();
        if sinks.is_empty() {
            return;
        }
        let bucket = bucket_name(&self.prefix, segment, suffix);
        for sink in sinks.iter() {
            sink.increment(&bucket, &self.tags, SAMPLE_RATE);
        }
    }

    pub fn timing(&self, segment: &str, duration: Duration) {
        let sinks = self.sinks.load();
        if sinks.is_empty() {
            return;
        }
        let bucket = bucket_name(&self.prefix, segment, TIMING);
        for sink in sinks.iter() {
            sink.timing(&bucket, &self.tags, duration, SAMPLE_RATE);
        }
    }

    /// Start timing an attempt; the sample is recorded when the guard drops.
    pub fn start_timer(&self, segment: &str) -> TimingGuard<'_> {
        TimingGuard {
            recorder: self,
            segment: segment.to_string(),
            started: Instant::now(),
        }
    }

    /// Copy with the same prefix, tags and sinks.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            tags: self.tags.clone(),
            sinks: ArcSwap::new(self.sinks.load_full()),
        }
    }
}

impl fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsRecorder")
            .field("prefix", &self.prefix)
            .field("tags", &self.tags)
            .field("sinks", &self.sink_count())
            .finish()
    }
}

/// RAII timer for one attempt.
pub struct TimingGuard<'a> {
    recorder: &'a StatsRecorder,
    segment: String,
    started: Instant,
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.recorder.timing(&self.segment, self.started.elapsed());
    }
}

/// Sink that forwards into the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsStats;

impl MetricsStats {
    pub fn new() -> Self {
        Self
    }

    fn sampled(sample_rate: f32) -> bool {
        sample_rate >= 1.0 || fastrand::f32() < sample_rate
    }
}

/// `k:v` becomes `k=v`, a bare tag becomes `tag=<value>`.
fn labels(tags: &[String]) -> Vec<Label> {
    tags.iter()
        .map(|tag| match tag.split_once(':') {
            Some((k, v)) => Label::new(k.to_string(), v.to_string()),
            None => Label::new("tag", tag.clone()),
        })
        .collect()
}

impl Stats for MetricsStats {
    fn increment(&self, bucket: &str, tags: &[String], sample_rate: f32) {
        if Self::sampled(sample_rate) {
            metrics::counter!(bucket.to_string(), labels(tags)).increment(1);
        }
    }

    fn timing(&self, bucket: &str, tags: &[String], duration: Duration, sample_rate: f32) {
        if Self::sampled(sample_rate) {
            metrics::histogram!(bucket.to_string(), labels(tags)).record(duration.as_secs_f64());
        }
    }
}

/// Error installing the exporter.
#[derive(Debug, thiserror::Error)]
pub enum MetricsInitError {
    #[error("invalid metrics server address '{0}'")]
    Address(String),
    #[error(transparent)]
    Exporter(#[from] BuildError),
}

/// Install the Prometheus exporter on `stats.server`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(stats: &StatsConfig) -> Result<(), MetricsInitError> {
    let addr: SocketAddr = stats
        .server
        .parse()
        .map_err(|_| MetricsInitError::Address(stats.server.clone()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
