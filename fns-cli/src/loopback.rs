//! A minimal in-process `Cluster`/`Dialer`/`TransportClient` trio, purely
//! so `fns-cli` can demonstrate `EndpointManager::request` end to end
//! without a real gossip/transport stack (spec.md §1 non-goals, §6;
//! SPEC_FULL.md §10's "CLI bootstrap").
//!
//! There is no network I/O here: a dialed "client" just calls straight
//! into whichever `RequestHandler` was registered under that address.
//! This single-node demo never actually emits a `MembershipEvent`, so the
//! membership loop it feeds idles until the channel closes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fns_core::{
    Dialer, Entry, FnsError, Lockers, MembershipEvent, RequestHandler, Shared, Store,
    TransportClient, TransportResponse,
};
use fns_core::Cluster;
use tokio::sync::mpsc;

/// Maps an advertised address to the in-process handler that answers
/// calls to it. `fns-cli`'s demo registers exactly one entry (itself)
/// before starting the manager.
#[derive(Clone, Default)]
pub struct LoopbackRegistry {
    handlers: Arc<Mutex<HashMap<String, Arc<dyn RequestHandler>>>>,
}

impl LoopbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, address: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.handlers.lock().unwrap().insert(address.into(), handler);
    }
}

#[async_trait]
impl Dialer for LoopbackRegistry {
    async fn dial(&self, address: &str) -> Result<Arc<dyn TransportClient>, FnsError> {
        let handler = self
            .handlers
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| FnsError::Unavailable {
                reason: format!("no loopback handler registered for {address}"),
            })?;
        Ok(Arc::new(LoopbackClient { handler }))
    }
}

struct LoopbackClient {
    handler: Arc<dyn RequestHandler>,
}

#[async_trait]
impl TransportClient for LoopbackClient {
    async fn call(&self, request: Entry) -> Result<TransportResponse, FnsError> {
        Ok(self.handler.handle(request).await)
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn close(&self) {}
}

struct LoopbackShared {
    store: Arc<dyn Store>,
    lockers: Arc<dyn Lockers>,
}

impl Shared for LoopbackShared {
    fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    fn lockers(&self) -> Arc<dyn Lockers> {
        Arc::clone(&self.lockers)
    }
}

/// A single-node cluster: `join`/`leave`/`add_service` are no-ops, and
/// `node_events` hands back a receiver whose sender is dropped
/// immediately, so the membership loop it drives sees a closed channel
/// and returns right away. Good enough to make `EndpointManager::listen`
/// runnable without a real membership protocol.
pub struct LoopbackCluster {
    shared: Arc<dyn Shared>,
    events: Mutex<Option<mpsc::Receiver<MembershipEvent>>>,
}

impl LoopbackCluster {
    pub fn new(store: Arc<dyn Store>, lockers: Arc<dyn Lockers>) -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            shared: Arc::new(LoopbackShared { store, lockers }),
            events: Mutex::new(Some(rx)),
        }
    }
}

#[async_trait]
impl Cluster for LoopbackCluster {
    async fn join(&self) -> Result<(), FnsError> {
        Ok(())
    }

    async fn leave(&self) -> Result<(), FnsError> {
        Ok(())
    }

    async fn add_service(&self, _info: fns_core::ServiceInfo) -> Result<(), FnsError> {
        Ok(())
    }

    fn node_events(&self) -> mpsc::Receiver<MembershipEvent> {
        self.events
            .lock()
            .unwrap()
            .take()
            .expect("node_events consumed exactly once")
    }

    fn shared(&self) -> Arc<dyn Shared> {
        Arc::clone(&self.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fns_core::TransportResponse as Resp;

    struct EchoHandler;

    #[async_trait]
    impl RequestHandler for EchoHandler {
        async fn handle(&self, request: Entry) -> Resp {
            Resp {
                status: fns_core::status::OK,
                entry: request,
            }
        }
    }

    #[tokio::test]
    async fn dialing_a_registered_address_reaches_its_handler() {
        let registry = LoopbackRegistry::new();
        registry.register("node-1", Arc::new(EchoHandler));

        let client = registry.dial("node-1").await.unwrap();
        let response = client
            .call(Entry {
                path: "/math/add".to_string(),
                ..Entry::default()
            })
            .await
            .unwrap();
        assert_eq!(response.entry.path, "/math/add");
    }

    #[tokio::test]
    async fn dialing_an_unknown_address_fails() {
        let registry = LoopbackRegistry::new();
        assert!(registry.dial("ghost").await.is_err());
    }
}
