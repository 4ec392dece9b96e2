//! Circuit breaker for endpoint protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: testing if endpoint recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: requests in window >= volume threshold and error % >= threshold
//! Open → Half-Open: after sleep window
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-endpoint circuit breaker (not global), keyed by endpoint key
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering endpoint)
//! - Trips are evaluated on admission, not when a failure is recorded

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::resilience::timeouts::{with_deadline, Interrupted};

/// Error produced by the caller's work.
pub type WorkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The protected operation handed to a breaker.
pub type Operation<'a> = BoxFuture<'a, Result<(), WorkError>>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
pub const DEFAULT_ERROR_PERCENT_THRESHOLD: u8 = 50;
pub const DEFAULT_VOLUME_THRESHOLD: u32 = 20;
pub const DEFAULT_SLEEP_WINDOW: Duration = Duration::from_millis(5000);

const WINDOW_BUCKETS: usize = 10;

/// Signal returned by a breaker execution.
#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("timeout")]
    Timeout,
    #[error("circuit open")]
    CircuitOpen,
    #[error("max concurrency")]
    MaxConcurrency,
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Work(WorkError),
}

/// Isolation parameters for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSettings {
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    pub error_percent_threshold: u8,
    pub request_volume_threshold: u32,
    pub sleep_window: Duration,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            error_percent_threshold: DEFAULT_ERROR_PERCENT_THRESHOLD,
            request_volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            sleep_window: DEFAULT_SLEEP_WINDOW,
        }
    }
}

/// Per-key isolation boundary.
///
/// `execute` runs `operation` under the circuit named `key`, enforcing the
/// configured timeout and concurrency bound.
pub trait CircuitBreaker: Send + Sync {
    /// Register isolation parameters for `key`.
    fn configure(&self, key: &str, settings: CircuitSettings);

    fn execute<'a>(
        &'a self,
        key: &'a str,
        operation: Operation<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), BreakerError>>;
}

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    second: u64,
    successes: u32,
    failures: u32,
}

/// Ten one-second buckets of outcomes.
#[derive(Debug)]
struct RollingWindow {
    origin: Instant,
    buckets: [Bucket; WINDOW_BUCKETS],
}

impl RollingWindow {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            buckets: [Bucket::default(); WINDOW_BUCKETS],
        }
    }

    fn second(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.origin).as_secs()
    }

    fn record(&mut self, now: Instant, success: bool) {
        let second = self.second(now);
        let bucket = &mut self.buckets[(second % WINDOW_BUCKETS as u64) as usize];
        if bucket.second != second {
            *bucket = Bucket { second, ..Bucket::default() };
        }
        if success {
            bucket.successes += 1;
        } else {
            bucket.failures += 1;
        }
    }

    /// (total requests, failures) inside the window.
    fn totals(&self, now: Instant) -> (u64, u64) {
        let second = self.second(now);
        self.buckets
            .iter()
            .filter(|b| b.second <= second && second - b.second < WINDOW_BUCKETS as u64)
            .fold((0, 0), |(total, failed), b| {
                (
                    total + u64::from(b.successes) + u64::from(b.failures),
                    failed + u64::from(b.failures),
                )
            })
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

#[derive(Debug)]
struct Health {
    state: CircuitState,
    opened_at: Option<Instant>,
    window: RollingWindow,
}

/// One named circuit.
#[derive(Debug)]
struct Circuit {
    name: String,
    settings: CircuitSettings,
    health: Mutex<Health>,
    in_flight: AtomicUsize,
}

/// Releases a concurrency slot on drop.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Circuit {
    fn new(name: &str, settings: CircuitSettings) -> Self {
        Self {
            name: name.to_string(),
            settings,
            health: Mutex::new(Health {
                state: CircuitState::Closed,
                opened_at: None,
                window: RollingWindow::new(),
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// The lock only guards counters, so a poisoned guard is still consistent.
    fn health(&self) -> MutexGuard<'_, Health> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> CircuitState {
        self.health().state
    }

    fn allow_request(&self) -> bool {
        let now = Instant::now();
        let mut health = self.health();

        match health.state {
            CircuitState::Closed => {
                let (total, failed) = health.window.totals(now);
                let tripped = total > 0
                    && total >= u64::from(self.settings.request_volume_threshold)
                    && failed * 100 >= u64::from(self.settings.error_percent_threshold) * total;
                if tripped {
                    tracing::warn!(circuit = %self.name, requests = total, failures = failed, "Circuit breaker opening");
                    health.state = CircuitState::Open;
                    health.opened_at = Some(now);
                }
                !tripped
            }
            CircuitState::Open => {
                let elapsed = health
                    .opened_at
                    .map_or(Duration::MAX, |opened| now.saturating_duration_since(opened));
                if elapsed >= self.settings.sleep_window {
                    tracing::debug!(circuit = %self.name, "Circuit breaker transitioning to half-open");
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            // Probe already in flight
            CircuitState::HalfOpen => false,
        }
    }

    /// Give the probe slot back without judging the endpoint.
    fn abandon_probe(&self) {
        let mut health = self.health();
        if health.state == CircuitState::HalfOpen {
            health.state = CircuitState::Open;
        }
    }

    fn record(&self, success: bool) {
        let now = Instant::now();
        let mut health = self.health();

        match (health.state, success) {
            (CircuitState::HalfOpen, true) => {
                tracing::info!(circuit = %self.name, "Circuit breaker closing");
                health.state = CircuitState::Closed;
                health.opened_at = None;
                health.window.reset();
            }
            (CircuitState::HalfOpen, false) => {
                tracing::warn!(circuit = %self.name, "Probe failed, circuit breaker re-opening");
                health.state = CircuitState::Open;
                health.opened_at = Some(now);
            }
            _ => health.window.record(now, success),
        }
    }

    fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        let mut prev = self.in_flight.load(Ordering::Relaxed);
        loop {
            if prev >= self.settings.max_concurrent_requests {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                prev, prev + 1, Ordering::Relaxed, Ordering::Relaxed
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
        })
    }

    async fn run(&self, operation: Operation<'_>, cancel: &CancellationToken) -> Result<(), BreakerError> {
        if !self.allow_request() {
            return Err(BreakerError::CircuitOpen);
        }

        let Some(_slot) = self.try_acquire() else {
            self.abandon_probe();
            return Err(BreakerError::MaxConcurrency);
        };

        match with_deadline(self.settings.timeout, cancel, operation).await {
            Ok(Ok(())) => {
                self.record(true);
                Ok(())
            }
            Ok(Err(e)) => {
                self.record(false);
                Err(BreakerError::Work(e))
            }
            Err(Interrupted::Elapsed(_)) => {
                self.record(false);
                Err(BreakerError::Timeout)
            }
            Err(Interrupted::Cancelled) => {
                self.abandon_probe();
                Err(BreakerError::Cancelled)
            }
        }
    }
}

/// Default breaker engine: one circuit per key, created on first use.
#[derive(Default)]
pub struct CircuitRegistry {
    circuits: DashMap<String, Arc<Circuit>>,
    defaults: CircuitSettings,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings used for keys that were never configured.
    pub fn with_defaults(defaults: CircuitSettings) -> Self {
        Self {
            circuits: DashMap::new(),
            defaults,
        }
    }

    /// Current state of the circuit for `key`, if it exists.
    pub fn state(&self, key: &str) -> Option<CircuitState> {
        self.circuits.get(key).map(|c| c.state())
    }

    /// Settings in force for `key`, if it exists.
    pub fn settings(&self, key: &str) -> Option<CircuitSettings> {
        self.circuits.get(key).map(|c| c.settings)
    }

    fn circuit(&self, key: &str) -> Arc<Circuit> {
        if let Some(circuit) = self.circuits.get(key) {
            return circuit.clone();
        }
        self.circuits
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Circuit::new(key, self.defaults)))
            .clone()
    }
}

impl fmt::Debug for CircuitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitRegistry")
            .field("circuits", &self.circuits.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl CircuitBreaker for CircuitRegistry {
    fn configure(&self, key: &str, settings: CircuitSettings) {
        // Reconfiguring with identical settings keeps the circuit's history
        if self.settings(key) == Some(settings) {
            return;
        }
        tracing::debug!(circuit = %key, ?settings, "Configuring circuit");
        self.circuits
            .insert(key.to_string(), Arc::new(Circuit::new(key, settings)));
    }

    fn execute<'a>(
        &'a self,
        key: &'a str,
        operation: Operation<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), BreakerError>> {
        let circuit = self.circuit(key);
        Box::pin(async move { circuit.run(operation, cancel).await })
    }
}
