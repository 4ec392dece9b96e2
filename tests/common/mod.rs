//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use replica_dispatch::{ClientConfig, Endpoint, SelectionError, Stats, StatsConfig, Strategy};

/// One sample seen by [`RecordingStats`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Increment { bucket: String, tags: Vec<String> },
    Timing { bucket: String, tags: Vec<String>, duration: Duration },
}

/// Stats sink that remembers everything it was sent.
#[derive(Debug, Default)]
pub struct RecordingStats {
    samples: Mutex<Vec<Sample>>,
}

impl RecordingStats {
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn increments(&self, bucket: &str) -> usize {
        self.samples()
            .iter()
            .filter(|s| matches!(s, Sample::Increment { bucket: b, .. } if b == bucket))
            .count()
    }

    pub fn timings(&self, bucket: &str) -> usize {
        self.samples()
            .iter()
            .filter(|s| matches!(s, Sample::Timing { bucket: b, .. } if b == bucket))
            .count()
    }

    pub fn tags_of(&self, bucket: &str) -> Option<Vec<String>> {
        self.samples().into_iter().find_map(|s| match s {
            Sample::Increment { bucket: b, tags } if b == bucket => Some(tags),
            Sample::Timing { bucket: b, tags, .. } if b == bucket => Some(tags),
            _ => None,
        })
    }
}

impl Stats for RecordingStats {
    fn increment(&self, bucket: &str, tags: &[String], _sample_rate: f32) {
        self.samples.lock().unwrap().push(Sample::Increment {
            bucket: bucket.to_string(),
            tags: tags.to_vec(),
        });
    }

    fn timing(&self, bucket: &str, tags: &[String], duration: Duration, _sample_rate: f32) {
        self.samples.lock().unwrap().push(Sample::Timing {
            bucket: bucket.to_string(),
            tags: tags.to_vec(),
            duration,
        });
    }
}

/// Strategy whose picks are decided by the test.
#[derive(Debug)]
pub struct ScriptedStrategy {
    endpoints: Mutex<Vec<Endpoint>>,
    pick: fn(usize, usize) -> usize,
    calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl ScriptedStrategy {
    /// Alternate through the pool starting at the first endpoint.
    pub fn alternating() -> Self {
        Self::with_pick(|call, len| call % len)
    }

    /// Always hand out the first endpoint.
    pub fn pinned() -> Self {
        Self::with_pick(|_, _| 0)
    }

    fn with_pick(pick: fn(usize, usize) -> usize) -> Self {
        Self {
            endpoints: Mutex::new(Vec::new()),
            pick,
            calls: AtomicUsize::new(0),
            set_calls: AtomicUsize::new(0),
        }
    }

    pub fn next_endpoint_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_endpoints_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

impl Strategy for ScriptedStrategy {
    fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        *self.endpoints.lock().unwrap() = endpoints;
    }

    fn endpoints(&self) -> Arc<[Endpoint]> {
        Arc::from(self.endpoints.lock().unwrap().as_slice())
    }

    fn next_endpoint(&self) -> Result<Endpoint, SelectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let endpoints = self.endpoints.lock().unwrap();
        if endpoints.is_empty() {
            return Err(SelectionError::NoEndpoints);
        }
        Ok(endpoints[(self.pick)(call, endpoints.len())].clone())
    }
}

pub fn endpoints() -> Vec<Endpoint> {
    vec![
        "something:3232".parse().unwrap(),
        "somethingelse:2323".parse().unwrap(),
    ]
}

/// Config shared by most tests: 10ms timeout, breaker trips at 50% over 2 requests.
pub fn test_config(retries: Option<u32>) -> ClientConfig {
    ClientConfig {
        timeout_ms: 10,
        max_concurrent_requests: 10,
        error_percent_threshold: 50,
        default_volume_threshold: 2,
        retries,
        retry_delay_ms: 1,
        endpoints: endpoints(),
        stats: StatsConfig {
            enabled: false,
            prefix: "myapp".into(),
            tags: vec!["production".into()],
            ..StatsConfig::default()
        },
        ..ClientConfig::default()
    }
}

/// Start a programmable HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head; the mock ignores its content
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
