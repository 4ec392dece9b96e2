//! Random load balancing strategy.

use std::sync::Arc;
use crate::load_balancer::{Endpoint, EndpointPool, SelectionError, Strategy};

/// Uniform random selector.
#[derive(Debug, Default)]
pub struct Random {
    pool: EndpointPool,
}

impl Random {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            pool: EndpointPool::new(endpoints),
        }
    }
}

impl Strategy for Random {
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

        Ok(endpoints[fastrand::usize(..endpoints.len())].clone())
    }
}
