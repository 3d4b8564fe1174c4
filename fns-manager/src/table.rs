//! `Endpoints` (the per-service-name routing table) and `Registrations`
//! (the manager-owned map from service name to `Endpoints`), spec.md §3.
//!
//! `Registrations` is a read-copy-update snapshot behind `arc_swap`: the
//! membership loop is the sole writer (spec.md §5 "only the membership
//! loop writes"), and a concurrent `Get` always observes either the
//! pre- or post-event snapshot, never a partial one — exactly what
//! `ArcSwap::rcu` gives for free.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::seq::SliceRandom;
use semver::VersionReq;

use crate::endpoint::Endpoint;
use crate::version::VersionEndpoints;

/// The version-sorted routing table for one service name.
#[derive(Clone, Default)]
pub struct Endpoints {
    /// Strictly sorted ascending by version (spec.md §3 invariant (a)).
    buckets: Vec<VersionEndpoints>,
}

impl Endpoints {
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VersionEndpoints::is_empty)
    }

    pub fn iter_endpoints(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.buckets.iter().flat_map(VersionEndpoints::iter)
    }

    /// Exact `id` lookup across every version bucket.
    pub fn get(&self, id: &str) -> Option<Arc<Endpoint>> {
        self.buckets.iter().find_map(|bucket| bucket.get(id))
    }

    /// Newest version whose bucket still has an eligible endpoint
    /// (spec.md §8: "the chosen endpoint has the maximum version for
    /// which at least one healthy endpoint exists").
    pub fn max_one(&self) -> Option<Arc<Endpoint>> {
        self.buckets.iter().rev().find_map(VersionEndpoints::next)
    }

    /// A random eligible endpoint whose version satisfies `constraint`
    /// (spec.md §4.1 `Get` step 3).
    pub fn range(&self, constraint: &VersionReq) -> Option<Arc<Endpoint>> {
        let candidates: Vec<Arc<Endpoint>> = self
            .buckets
            .iter()
            .filter(|bucket| constraint.matches(&bucket.version))
            .flat_map(VersionEndpoints::iter)
            .filter(|e| e.eligible())
            .cloned()
            .collect();
        candidates.choose(&mut rand::thread_rng()).cloned()
    }

    /// Functional insert: returns a new `Endpoints` with `endpoint` added
    /// to its version bucket (creating the bucket, in sorted position, if
    /// this is the first endpoint at that version).
    pub fn with_endpoint_added(&self, endpoint: Arc<Endpoint>) -> Self {
        let mut buckets = self.buckets.clone();
        match buckets.binary_search_by(|bucket| bucket.version.cmp(&endpoint.version)) {
            Ok(index) => buckets[index] = buckets[index].with_added(endpoint),
            Err(index) => {
                buckets.insert(
                    index,
                    VersionEndpoints::new(endpoint.version.clone(), vec![endpoint]),
                );
            }
        }
        Self { buckets }
    }

    /// Functional remove: returns a new `Endpoints` with the endpoint
    /// `id` removed from whichever bucket holds it, dropping the bucket
    /// entirely if it becomes empty (spec.md §4.2 "Remove handling").
    pub fn with_endpoint_removed(&self, id: &str) -> Self {
        let buckets = self
            .buckets
            .iter()
            .map(|bucket| bucket.with_removed(id))
            .filter(|bucket| !bucket.is_empty())
            .collect();
        Self { buckets }
    }
}

/// The manager's view of the remote registration table: service name →
/// `Endpoints`. Mutated only by the membership loop (spec.md §3 "Owned
/// by the manager; mutated only by the membership loop").
pub struct Registrations {
    inner: ArcSwap<HashMap<String, Endpoints>>,
}

impl Default for Registrations {
    fn default() -> Self {
        Self::new()
    }
}

impl Registrations {
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn get_service(&self, name: &str) -> Option<Endpoints> {
        self.inner.load().get(name).cloned()
    }

    pub fn snapshot(&self) -> Arc<HashMap<String, Endpoints>> {
        self.inner.load_full()
    }

    /// Adds `endpoint` under `service_name` (spec.md §4.2 Add handling
    /// step 4: "Insert into the registration table under a write lock").
    pub fn add(&self, service_name: &str, endpoint: Arc<Endpoint>) {
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            let entry = next.get(service_name).cloned().unwrap_or_default();
            next.insert(service_name.to_string(), entry.with_endpoint_added(Arc::clone(&endpoint)));
            next
        });
    }

    /// Removes the endpoint `id` from `service_name`; drops the service
    /// entry entirely if it becomes empty (spec.md §4.2 "Remove
    /// handling").
    pub fn remove(&self, service_name: &str, id: &str) {
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            if let Some(entry) = next.get(service_name) {
                let updated = entry.with_endpoint_removed(id);
                if updated.is_empty() {
                    next.remove(service_name);
                } else {
                    next.insert(service_name.to_string(), updated);
                }
            }
            next
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fns_core::{Entry, FnsError, TransportClient, TransportResponse};
    use semver::Version;

    struct NoopClient;

    #[async_trait]
    impl TransportClient for NoopClient {
        async fn call(&self, _request: Entry) -> Result<TransportResponse, FnsError> {
            unreachable!()
        }
        async fn health_check(&self) -> bool {
            true
        }
        async fn close(&self) {}
    }

    fn endpoint(id: &str, version: &str) -> Arc<Endpoint> {
        Arc::new(Endpoint::new(
            "addr".to_string(),
            id.to_string(),
            Version::parse(version).unwrap(),
            "math".to_string(),
            false,
            None,
            &[],
            Arc::new(NoopClient),
        ))
    }

    #[test]
    fn max_one_picks_the_highest_version_with_a_healthy_endpoint() {
        let registrations = Registrations::new();
        registrations.add("math", endpoint("a", "1.0.0"));
        registrations.add("math", endpoint("b", "1.2.0"));

        let table = registrations.get_service("math").unwrap();
        assert_eq!(table.max_one().unwrap().version, Version::new(1, 2, 0));
    }

    #[test]
    fn range_restricts_to_the_matching_interval() {
        let registrations = Registrations::new();
        registrations.add("math", endpoint("a", "1.0.0"));
        registrations.add("math", endpoint("b", "1.2.0"));

        let table = registrations.get_service("math").unwrap();
        let constraint: VersionReq = ">=1.0.0, <1.2.0".parse().unwrap();
        let selected = table.range(&constraint).unwrap();
        assert_eq!(selected.id, "a");
    }

    #[test]
    fn remove_drops_the_service_once_its_last_endpoint_is_gone() {
        let registrations = Registrations::new();
        registrations.add("math", endpoint("a", "1.0.0"));
        registrations.remove("math", "a");
        assert!(registrations.get_service("math").is_none());
    }

    #[test]
    fn get_is_consistent_with_a_concurrent_add() {
        let registrations = Arc::new(Registrations::new());
        registrations.add("math", endpoint("a", "1.0.0"));
        let before = registrations.get_service("math").unwrap();
        registrations.add("math", endpoint("b", "1.1.0"));
        // The snapshot taken before the second add is unaffected by it.
        assert_eq!(before.iter_endpoints().count(), 1);
        assert_eq!(
            registrations.get_service("math").unwrap().iter_endpoints().count(),
            2
        );
    }
}
