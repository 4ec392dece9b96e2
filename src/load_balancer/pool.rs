//! Endpoint pool storage.
//!
//! # Responsibilities
//! - Hold the ordered endpoint list for one strategy
//! - Replace it in a single pointer swap so readers never see a torn pool

use arc_swap::ArcSwap;
use std::sync::Arc;
use crate::load_balancer::Endpoint;

/// Atomically replaceable, ordered set of endpoints.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: ArcSwap<Vec<Endpoint>>,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: ArcSwap::from_pointee(endpoints),
        }
    }

    /// Replace the pool.
    pub fn store(&self, endpoints: Vec<Endpoint>) {
        self.endpoints.store(Arc::new(endpoints));
    }

    /// Current pool.
    pub fn load(&self) -> Arc<Vec<Endpoint>> {
        self.endpoints.load_full()
    }

    /// Current pool as a shared slice.
    pub fn snapshot(&self) -> Arc<[Endpoint]> {
        Arc::from(self.endpoints.load().as_slice())
    }

    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EndpointPool {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
