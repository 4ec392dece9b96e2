//! Round-robin load balancing strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::{Endpoint, EndpointPool, SelectionError, Strategy};

/// Round-robin selector.
/// Stores a counter shared by every caller to rotate through the pool.
#[derive(Debug, Default)]
pub struct RoundRobin {
    pool: EndpointPool,
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            pool: EndpointPool::new(endpoints),
            counter: AtomicUsize::new(0),
        }
    }
}

impl Strategy for RoundRobin {
    fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        self.pool.store(endpoints);
    }

    fn endpoints(&self) -> Arc<[Endpoint]> {
        self.pool.snapshot()
    }

    fn len(&self) -> usize {
        self.pool.len()
    }

    fn next_endpoint(&self) -> Result<Endpoint, SelectionError> {
        let endpoints = self.pool.load();
        if endpoints.is_empty() {
            return Err(SelectionError::NoEndpoints);
        }

        // Modulo the pool we loaded, so a concurrent swap can't push us out of range
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % endpoints.len();
        Ok(endpoints[index].clone())
    }
}
