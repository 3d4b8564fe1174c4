//! `VersionEndpoints`: an ordered bucket of `Endpoint`s sharing one exact
//! version, with a round-robin `Next()` (spec.md §3, §5).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use semver::Version;

use crate::endpoint::Endpoint;

#[derive(Clone)]
pub struct VersionEndpoints {
    pub version: Version,
    endpoints: Vec<Arc<Endpoint>>,
    /// Shared across rebuilt copies of the same bucket so a membership
    /// change doesn't reset round-robin fairness for unrelated callers
    /// (see `fns-manager::table::Endpoints::with_endpoint_added`).
    cursor: Arc<AtomicUsize>,
}

impl VersionEndpoints {
    pub fn new(version: Version, endpoints: Vec<Arc<Endpoint>>) -> Self {
        Self {
            version,
            endpoints,
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.endpoints.iter()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.iter().find(|e| e.id == id).cloned()
    }

    /// Round-robin cursor via atomic add+modulo, skipping non-running or
    /// unhealthy entries, so concurrent callers never block each other
    /// and see a near-uniform distribution (spec.md §5).
    pub fn next(&self) -> Option<Arc<Endpoint>> {
        let len = self.endpoints.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::SeqCst);
        for attempt in 0..len {
            let pos = start.wrapping_add(attempt) % len;
            let candidate = &self.endpoints[pos];
            if candidate.eligible() {
                return Some(Arc::clone(candidate));
            }
        }
        None
    }

    pub fn with_added(&self, endpoint: Arc<Endpoint>) -> Self {
        let mut endpoints = self.endpoints.clone();
        endpoints.push(endpoint);
        Self {
            version: self.version.clone(),
            endpoints,
            cursor: Arc::clone(&self.cursor),
        }
    }

    pub fn with_removed(&self, id: &str) -> Self {
        let endpoints = self
            .endpoints
            .iter()
            .filter(|e| e.id != id)
            .cloned()
            .collect();
        Self {
            version: self.version.clone(),
            endpoints,
            cursor: Arc::clone(&self.cursor),
        }
    }
}
