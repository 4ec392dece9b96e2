//! Failure injection tests
//!
//! Verifies timeouts, open circuits and breaker rejections surface as the
//! right errors and counters.

mod common;

use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use common::{test_config, RecordingStats, ScriptedStrategy};
use replica_dispatch::resilience::circuit_breaker::Operation;
use replica_dispatch::{
    AttemptError, BreakerError, CancellationToken, CircuitBreaker, CircuitSettings, Client,
    ConstantBackoff, Endpoint, RoundRobin,
};

async fn slow_work(_endpoint: Endpoint) -> Result<(), &'static str> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

#[tokio::test]
async fn test_slow_work_times_out() {
    let client = Client::new(
        test_config(Some(0)),
        Arc::new(ScriptedStrategy::pinned()),
        Arc::new(ConstantBackoff),
    );
    let stats = Arc::new(RecordingStats::default());
    client.register_stats(stats.clone());

    let err = client.dispatch(slow_work).await.unwrap_err();

    assert_eq!(err.to_string(), "timeout");
    assert!(matches!(err.last(), Some(AttemptError::Timeout)));
    assert_eq!(stats.increments("myapp.something_3232.timeout"), 1);
    assert_eq!(stats.timings("myapp.something_3232.timing"), 1);
    assert_eq!(stats.increments("myapp.something_3232.success"), 0);
}

#[tokio::test]
async fn test_repeated_timeouts_open_the_circuit() {
    let client = Client::new(
        test_config(Some(2)),
        Arc::new(ScriptedStrategy::pinned()),
        Arc::new(ConstantBackoff),
    );
    let stats = Arc::new(RecordingStats::default());
    client.register_stats(stats.clone());

    let err = client.dispatch(slow_work).await.unwrap_err();

    assert_eq!(err.to_string(), "timeout, timeout, circuit open");
    assert_eq!(stats.increments("myapp.something_3232.called"), 3);
    assert_eq!(stats.increments("myapp.something_3232.timeout"), 2);
    assert_eq!(stats.increments("myapp.something_3232.circuitopen"), 1);
    assert_eq!(stats.timings("myapp.something_3232.timing"), 3);
}

#[tokio::test]
async fn test_open_circuit_never_runs_work() {
    let client = Client::new(
        test_config(Some(2)),
        Arc::new(ScriptedStrategy::pinned()),
        Arc::new(ConstantBackoff),
    );
    let invoked = AtomicUsize::new(0);

    let err = client
        .dispatch(|endpoint: Endpoint| {
            invoked.fetch_add(1, Ordering::SeqCst);
            slow_work(endpoint)
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "timeout, timeout, circuit open");
    assert_eq!(invoked.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_round_robin_spreads_timeouts_below_volume() {
    // Each endpoint sees too few requests in the window to trip; the
    // timeout, timeout, circuit open sequence needs a pinned endpoint
    // (test_repeated_timeouts_open_the_circuit)
    let client = Client::new(
        test_config(Some(2)),
        Arc::new(RoundRobin::new()),
        Arc::new(ConstantBackoff),
    );

    let err = client.dispatch(slow_work).await.unwrap_err();

    assert_eq!(err.to_string(), "timeout, timeout, timeout");
}

/// Breaker that answers from a script instead of measuring anything.
#[derive(Default)]
struct ScriptedBreaker {
    script: Mutex<VecDeque<Option<BreakerError>>>,
    configured: Mutex<Vec<String>>,
}

impl ScriptedBreaker {
    fn new(script: Vec<Option<BreakerError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            configured: Mutex::default(),
        }
    }
}

impl CircuitBreaker for ScriptedBreaker {
    fn configure(&self, key: &str, _settings: CircuitSettings) {
        self.configured.lock().unwrap().push(key.to_string());
    }

    fn execute<'a>(
        &'a self,
        _key: &'a str,
        operation: Operation<'a>,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), BreakerError>> {
        let next = self.script.lock().unwrap().pop_front().flatten();
        Box::pin(async move {
            match next {
                Some(err) => Err(err),
                None => operation.await.map_err(BreakerError::Work),
            }
        })
    }
}

#[tokio::test]
async fn test_breaker_signals_map_to_outcomes() {
    let breaker = Arc::new(ScriptedBreaker::new(vec![
        Some(BreakerError::Timeout),
        Some(BreakerError::CircuitOpen),
        Some(BreakerError::MaxConcurrency),
        Some(BreakerError::Work("boom".into())),
    ]));
    let client = Client::with_breaker(
        test_config(Some(3)),
        Arc::new(ScriptedStrategy::pinned()),
        Arc::new(ConstantBackoff),
        breaker.clone(),
    );
    let stats = Arc::new(RecordingStats::default());
    client.register_stats(stats.clone());

    let err = client
        .dispatch(|_endpoint: Endpoint| async { Ok::<(), &str>(()) })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "timeout, circuit open, max concurrency, boom");
    assert!(matches!(err.errors()[0], AttemptError::Timeout));
    assert!(matches!(err.errors()[1], AttemptError::CircuitOpen));
    assert!(matches!(err.errors()[2], AttemptError::General(_)));
    assert!(matches!(err.errors()[3], AttemptError::General(_)));

    assert_eq!(stats.increments("myapp.something_3232.timeout"), 1);
    assert_eq!(stats.increments("myapp.something_3232.circuitopen"), 1);
    assert_eq!(stats.increments("myapp.something_3232.error"), 2);
    assert_eq!(
        *breaker.configured.lock().unwrap(),
        vec!["http://something:3232/".to_string(), "http://somethingelse:2323/".to_string()]
    );
}

#[tokio::test]
async fn test_breaker_passes_work_through_when_admitted() {
    let breaker = Arc::new(ScriptedBreaker::new(vec![Some(BreakerError::CircuitOpen)]));
    let client = Client::with_breaker(
        test_config(Some(1)),
        Arc::new(ScriptedStrategy::pinned()),
        Arc::new(ConstantBackoff),
        breaker,
    );

    let result = client
        .dispatch(|_endpoint: Endpoint| async { Ok::<(), &str>(()) })
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_concurrency_limit_rejects_extra_attempts() {
    let mut config = test_config(Some(0));
    config.max_concurrent_requests = 1;
    config.timeout_ms = 5_000;
    let client = Client::new(config, Arc::new(ScriptedStrategy::pinned()), Arc::new(ConstantBackoff));
    let stats = Arc::new(RecordingStats::default());
    client.register_stats(stats.clone());

    let release = Arc::new(Notify::new());
    let work = |_endpoint: Endpoint| {
        let release = release.clone();
        async move {
            release.notified().await;
            Ok::<(), &str>(())
        }
    };

    let first = client.dispatch(&work);
    let second = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = client.dispatch(&work).await;
        release.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_ok());
    let err = second.unwrap_err();
    assert_eq!(err.to_string(), "max concurrency");
    assert_eq!(stats.increments("myapp.something_3232.error"), 1);
    assert_eq!(stats.increments("myapp.something_3232.success"), 1);
}
