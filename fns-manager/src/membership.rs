//! The membership event loop (spec.md §4.2): reconciles the cluster's
//! node event stream with the registration table.

use std::sync::Arc;
use std::time::Duration;

use fns_core::{Dialer, MembershipEvent, Node, ServiceInfo};
use rand::Rng;
use tokio::sync::mpsc::Receiver;
use tokio::time::timeout;

use crate::endpoint::Endpoint;
use crate::table::Registrations;

const HEALTH_PROBE_ATTEMPTS: u32 = 10;
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const HEALTH_PROBE_SPACING: Duration = Duration::from_secs(1);
/// Upper bound on the random jitter added to each `HEALTH_PROBE_SPACING`
/// sleep, so many nodes probing the same dying peer don't all retry in
/// lockstep.
const HEALTH_PROBE_JITTER: Duration = Duration::from_millis(200);

fn jittered_spacing() -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=HEALTH_PROBE_JITTER.as_millis() as u64);
    HEALTH_PROBE_SPACING + Duration::from_millis(jitter_ms)
}

/// Drains `events` until the channel closes, reconciling each `Add`/
/// `Remove` against `registrations` serially (spec.md §4.2 "Ordering
/// guarantees": events are processed in delivery order, one at a time).
pub async fn run_membership_loop(
    mut events: Receiver<MembershipEvent>,
    registrations: Arc<Registrations>,
    dialer: Arc<dyn Dialer>,
) {
    while let Some(event) = events.recv().await {
        match event {
            MembershipEvent::Add(node) => handle_add(&node, &registrations, dialer.as_ref()).await,
            MembershipEvent::Remove(node) => handle_remove(&node, &registrations),
        }
    }
}

/// A node id already present under any of its advertised service names
/// makes this `Add` a no-op (spec.md §4.2 "idempotent").
fn node_already_present(registrations: &Registrations, node: &Node) -> bool {
    node.services.iter().any(|service| {
        registrations
            .get_service(&service.name)
            .map(|table| table.get(&node.id).is_some())
            .unwrap_or(false)
    })
}

/// `document` decodability is checked, not interpreted — generation and
/// schema are out of scope (spec.md §1 non-goals); a JSON parse is enough
/// to exercise the "skip services whose document fails to decode" rule.
fn document_decodes(document: &Option<String>) -> bool {
    match document {
        None => true,
        Some(raw) => serde_json::from_str::<serde_json::Value>(raw).is_ok(),
    }
}

async fn handle_add(node: &Node, registrations: &Registrations, dialer: &dyn Dialer) {
    if node_already_present(registrations, node) {
        return;
    }

    let client = match dialer.dial(&node.address).await {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(node = %node.id, address = %node.address, error = %err, "dial failed, skipping Add");
            return;
        }
    };

    if !health_probe(client.as_ref()).await {
        tracing::warn!(node = %node.id, address = %node.address, "health probe exhausted, skipping Add");
        client.close().await;
        return;
    }

    for service in &node.services {
        if !document_decodes(&service.document) {
            tracing::warn!(node = %node.id, service = %service.name, "document decode failed, skipping service");
            continue;
        }
        insert_endpoint(registrations, node, service, Arc::clone(&client));
    }
}

/// Up to 10 attempts, 2s per-attempt timeout, ~1s (plus jitter) sleep
/// between attempts; any success wins (spec.md §4.2 step 2).
async fn health_probe(client: &dyn fns_core::TransportClient) -> bool {
    for attempt in 0..HEALTH_PROBE_ATTEMPTS {
        let healthy = timeout(HEALTH_PROBE_TIMEOUT, client.health_check())
            .await
            .unwrap_or(false);
        if healthy {
            return true;
        }
        if attempt + 1 < HEALTH_PROBE_ATTEMPTS {
            tokio::time::sleep(jittered_spacing()).await;
        }
    }
    false
}

fn insert_endpoint(
    registrations: &Registrations,
    node: &Node,
    service: &ServiceInfo,
    client: Arc<dyn fns_core::TransportClient>,
) {
    let endpoint = Endpoint::new(
        node.address.clone(),
        node.id.clone(),
        node.version.clone(),
        service.name.clone(),
        service.internal,
        service.document.clone(),
        &service.functions,
        client,
    );
    registrations.add(&service.name, Arc::new(endpoint));
}

/// Removes `node`'s endpoint from every service it advertised. The
/// underlying dialed client is intentionally left open here rather than
/// closed per-service: a node's services all share the one client dialed
/// in `handle_add`, and closing it on the first service's removal would
/// break any sibling-service endpoint still being torn down in the same
/// event. The client is reclaimed when its last `Arc` (held only by the
/// registration table) drops.
fn handle_remove(node: &Node, registrations: &Registrations) {
    for service in &node.services {
        registrations.remove(&service.name, &node.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fns_core::{Entry, FnInfo, FnsError, TransportResponse};
    use semver::Version;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct ScriptedClient {
        succeed_after: usize,
        attempts: AtomicUsize,
        closed: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl fns_core::TransportClient for ScriptedClient {
        async fn call(&self, _request: Entry) -> Result<TransportResponse, FnsError> {
            unreachable!()
        }
        async fn health_check(&self) -> bool {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            attempt >= self.succeed_after
        }
        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct ScriptedDialer {
        succeed_after: usize,
        fail_dial: bool,
    }

    #[async_trait]
    impl Dialer for ScriptedDialer {
        async fn dial(&self, _address: &str) -> Result<Arc<dyn fns_core::TransportClient>, FnsError> {
            if self.fail_dial {
                return Err(FnsError::warning("dial refused"));
            }
            Ok(Arc::new(ScriptedClient {
                succeed_after: self.succeed_after,
                attempts: AtomicUsize::new(0),
                closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            }))
        }
    }

    fn sample_node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            name: "peer".to_string(),
            version: Version::new(1, 0, 0),
            address: "127.0.0.1:9000".to_string(),
            services: vec![ServiceInfo {
                name: "math".to_string(),
                internal: false,
                functions: vec![FnInfo {
                    name: "add".to_string(),
                    readonly: true,
                    internal: false,
                }],
                document: None,
            }],
        }
    }

    #[test]
    fn jittered_spacing_stays_within_its_bound() {
        for _ in 0..100 {
            let spacing = jittered_spacing();
            assert!(spacing >= HEALTH_PROBE_SPACING);
            assert!(spacing <= HEALTH_PROBE_SPACING + HEALTH_PROBE_JITTER);
        }
    }

    #[tokio::test]
    async fn add_inserts_an_endpoint_once_health_probe_succeeds() {
        let registrations = Registrations::new();
        let dialer = ScriptedDialer {
            succeed_after: 2,
            fail_dial: false,
        };
        handle_add(&sample_node("node-1"), &registrations, &dialer).await;

        let table = registrations.get_service("math").unwrap();
        assert!(table.get("node-1").is_some());
    }

    #[tokio::test]
    async fn add_is_a_noop_when_dial_fails() {
        let registrations = Registrations::new();
        let dialer = ScriptedDialer {
            succeed_after: 0,
            fail_dial: true,
        };
        handle_add(&sample_node("node-1"), &registrations, &dialer).await;
        assert!(registrations.get_service("math").is_none());
    }

    #[tokio::test]
    async fn add_is_idempotent_for_an_already_registered_node() {
        let registrations = Registrations::new();
        let dialer = ScriptedDialer {
            succeed_after: 0,
            fail_dial: false,
        };
        handle_add(&sample_node("node-1"), &registrations, &dialer).await;
        let before = registrations.get_service("math").unwrap().iter_endpoints().count();
        handle_add(&sample_node("node-1"), &registrations, &dialer).await;
        let after = registrations.get_service("math").unwrap().iter_endpoints().count();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn remove_drops_the_endpoint_by_name_and_id() {
        let registrations = Registrations::new();
        let dialer = ScriptedDialer {
            succeed_after: 0,
            fail_dial: false,
        };
        handle_add(&sample_node("node-1"), &registrations, &dialer).await;
        assert!(registrations.get_service("math").is_some());

        handle_remove(&sample_node("node-1"), &registrations);
        assert!(registrations.get_service("math").is_none());
    }

    #[tokio::test]
    async fn run_membership_loop_reacts_to_add_and_remove_events() {
        let registrations = Arc::new(Registrations::new());
        let dialer: Arc<dyn Dialer> = Arc::new(ScriptedDialer {
            succeed_after: 0,
            fail_dial: false,
        });
        let (tx, rx) = mpsc::channel(4);

        let registrations_for_loop = Arc::clone(&registrations);
        let loop_handle = tokio::spawn(run_membership_loop(rx, registrations_for_loop, dialer));

        tx.send(MembershipEvent::Add(sample_node("node-1"))).await.unwrap();
        tx.send(MembershipEvent::Remove(sample_node("node-1")))
            .await
            .unwrap();
        drop(tx);
        loop_handle.await.unwrap();

        assert!(registrations.get_service("math").is_none());
    }
}
