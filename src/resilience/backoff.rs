//! Retry wait schedules.

use std::fmt;
use std::time::Duration;
use rand::Rng;

/// Produces the waits slept between attempts.
///
/// The returned schedule always has exactly `retries` entries; an empty
/// schedule means a single attempt.
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    fn create(&self, retries: usize, delay: Duration) -> Vec<Duration>;
}

/// Same delay before every retry.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantBackoff;

impl ConstantBackoff {
    pub fn new() -> Self {
        Self
    }
}

impl BackoffStrategy for ConstantBackoff {
    fn create(&self, retries: usize, delay: Duration) -> Vec<Duration> {
        vec![delay; retries]
    }
}

/// Doubling delay, capped, with optional jitter.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    max: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(max: Duration) -> Self {
        Self { max, jitter: true }
    }

    /// Disable jitter (deterministic schedule).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn create(&self, retries: usize, delay: Duration) -> Vec<Duration> {
        (1..=retries)
            .map(|attempt| {
                let attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
                calculate_backoff(attempt, delay, self.max, self.jitter)
            })
            .collect()
    }
}

/// Calculate exponential backoff delay for the given retry (1-based).
///
/// Jitter adds 0 to 10% of the capped delay.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(attempt - 1);
    let capped_delay = base.saturating_mul(exponential_base).min(max);

    let jitter_range = (capped_delay / 10).as_millis() as u64;
    let extra = if jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped_delay + Duration::from_millis(extra)
}
