//! Load balancing dispatch client.
//!
//! # Responsibilities
//! - Pick an endpoint per attempt through the configured strategy
//! - Run the caller's work under that endpoint's circuit breaker
//! - Retry on failure through the backoff schedule
//! - Report per-endpoint metrics and collect every attempt's error

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::dispatch::error::{AttemptError, ClientError, Outcome};
use crate::load_balancer::{Endpoint, Strategy};
use crate::observability::metrics::{self, MetricsStats, Stats, StatsRecorder};
use crate::resilience::circuit_breaker::Operation;
use crate::resilience::{
    BackoffStrategy, CircuitBreaker, CircuitRegistry, Retrier, Retryable, WorkError,
};

/// Dispatches work to one of several interchangeable endpoints.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use replica_dispatch::{Client, ClientConfig, ConstantBackoff, Endpoint, RoundRobin};
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig {
///     endpoints: vec!["10.0.0.1:8080".parse()?, "10.0.0.2:8080".parse()?],
///     ..ClientConfig::default()
/// };
/// let client = Client::new(config, Arc::new(RoundRobin::new()), Arc::new(ConstantBackoff));
///
/// client
///     .dispatch(|endpoint: Endpoint| async move {
///         println!("calling {}", endpoint);
///         Ok::<(), std::io::Error>(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    strategy: Arc<dyn Strategy>,
    backoff: Arc<dyn BackoffStrategy>,
    breaker: Arc<dyn CircuitBreaker>,
    stats: StatsRecorder,
}

impl Client {
    /// Create a client backed by the default circuit breaker engine.
    pub fn new(
        config: ClientConfig,
        strategy: Arc<dyn Strategy>,
        backoff: Arc<dyn BackoffStrategy>,
    ) -> Self {
        Self::with_breaker(config, strategy, backoff, Arc::new(CircuitRegistry::new()))
    }

    /// Create a client with a caller supplied breaker.
    pub fn with_breaker(
        mut config: ClientConfig,
        strategy: Arc<dyn Strategy>,
        backoff: Arc<dyn BackoffStrategy>,
        breaker: Arc<dyn CircuitBreaker>,
    ) -> Self {
        // An empty list keeps whatever pool the strategy already holds
        if !config.endpoints.is_empty() {
            strategy.set_endpoints(config.endpoints.clone());
        }

        // Unset retries: one attempt per endpoint
        let retries = config.retries.unwrap_or_else(|| {
            u32::try_from(strategy.len().saturating_sub(1)).unwrap_or(u32::MAX)
        });
        config.retries = Some(retries);

        let settings = config.circuit_settings();
        for endpoint in strategy.endpoints().iter() {
            breaker.configure(endpoint.key(), settings);
        }

        let stats = StatsRecorder::new(config.stats.prefix.clone(), config.stats.tags.clone());
        if config.stats.enabled {
            stats.register(Arc::new(MetricsStats::new()));
        }

        tracing::info!(
            endpoints = strategy.len(),
            retries,
            timeout_ms = config.timeout_ms,
            stats_enabled = config.stats.enabled,
            "Dispatch client ready"
        );

        Self {
            config,
            strategy,
            backoff,
            breaker,
            stats,
        }
    }

    /// Effective configuration, with the retry count resolved.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Retries after the first attempt.
    pub fn retries(&self) -> u32 {
        self.config.retries.unwrap_or(0)
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    pub fn breaker(&self) -> &Arc<dyn CircuitBreaker> {
        &self.breaker
    }

    /// Add a metrics sink. Register sinks before sending traffic.
    pub fn register_stats(&self, sink: Arc<dyn Stats>) {
        self.stats.register(sink);
    }

    /// Replace the endpoint pool, configuring isolation for every endpoint.
    ///
    /// The retry count resolved at construction is kept.
    pub fn update_endpoints(&self, endpoints: Vec<Endpoint>) {
        let settings = self.config.circuit_settings();
        for endpoint in &endpoints {
            self.breaker.configure(endpoint.key(), settings);
        }

        tracing::info!(endpoints = endpoints.len(), "Endpoint pool updated");
        self.strategy.set_endpoints(endpoints);
    }

    /// Run `work` against endpoints until it succeeds or retries run out.
    ///
    /// Earlier failures are dropped when a later attempt succeeds.
    pub async fn dispatch<'w, F, Fut, E>(&'w self, work: F) -> Result<(), ClientError>
    where
        F: Fn(Endpoint) -> Fut + Send + Sync + 'w,
        Fut: Future<Output = Result<(), E>> + Send + 'w,
        E: Into<WorkError> + Send + 'w,
    {
        let cancel = CancellationToken::new();
        self.dispatch_with_cancel(work, &cancel).await
    }

    /// Like [`Client::dispatch`], stopping early once `cancel` fires.
    ///
    /// A cancelled call reports the failures so far followed by `cancelled`.
    pub async fn dispatch_with_cancel<'w, F, Fut, E>(
        &'w self,
        work: F,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError>
    where
        F: Fn(Endpoint) -> Fut + Send + Sync + 'w,
        Fut: Future<Output = Result<(), E>> + Send + 'w,
        E: Into<WorkError> + Send + 'w,
    {
        let span = tracing::debug_span!("dispatch", dispatch_id = %Uuid::new_v4());

        async move {
            let schedule = self.backoff.create(self.retries() as usize, self.config.retry_delay());
            let retrier = Retrier::new(schedule);
            let work = &work;

            let mut failures = match retrier.run(cancel, || self.attempt(work, cancel)).await {
                Ok(()) => return Ok(()),
                Err(failures) => failures,
            };

            // The retrier only stops short of its budget on cancellation
            let stopped_early = failures.len() < retrier.max_attempts()
                && failures.last().map_or(false, Retryable::is_retryable);
            if stopped_early {
                failures.push(AttemptError::Cancelled);
            }

            let err = ClientError::from(failures);
            tracing::warn!(attempts = err.len(), error = %err, "Dispatch failed");
            Err(err)
        }
        .instrument(span)
        .await
    }

    async fn attempt<'a, F, Fut, E>(
        &'a self,
        work: &'a F,
        cancel: &'a CancellationToken,
    ) -> Result<(), AttemptError>
    where
        F: Fn(Endpoint) -> Fut + Sync,
        Fut: Future<Output = Result<(), E>> + Send + 'a,
        E: Into<WorkError> + Send + 'a,
    {
        let endpoint = self.strategy.next_endpoint().map_err(|e| {
            tracing::error!(error = %e, "No endpoint available");
            AttemptError::from(e)
        })?;
        let segment = endpoint.metric_segment();

        self.stats.increment(&segment, metrics::CALLED);
        let _timer = self.stats.start_timer(&segment);

        // Work only starts once the breaker polls the operation
        let target = endpoint.clone();
        let operation: Operation<'a> = Box::pin(async move { work(target).await.map_err(Into::into) });
        let signal = self.breaker.execute(endpoint.key(), operation, cancel).await;

        let outcome = Outcome::of(&signal);
        self.stats.increment(&segment, outcome.suffix());

        match signal {
            Ok(()) => {
                tracing::debug!(endpoint = %endpoint, "Attempt succeeded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, outcome = ?outcome, error = %e, "Attempt failed");
                Err(AttemptError::from(e))
            }
        }
    }
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            strategy: self.strategy.clone(),
            backoff: self.backoff.clone(),
            breaker: self.breaker.clone(),
            stats: self.stats.duplicate(),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .field("backoff", &self.backoff)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
