//! The cluster membership interface consumed (not implemented) by the
//! endpoint manager and membership event loop (spec.md §4.2, §6).

use async_trait::async_trait;

use crate::error::FnsError;
use crate::locker::Lockers;
use crate::node::{Node, ServiceInfo};
use crate::store::Store;

/// One membership notification. Events for the same node id are
/// idempotent: an `Add` for an id already present is a no-op, a `Remove`
/// for an id not present is a no-op (enforced by the membership loop, not
/// by the cluster layer).
#[derive(Clone, Debug)]
pub enum MembershipEvent {
    Add(Node),
    Remove(Node),
}

/// The shared primitives a cluster implementation must expose: the
/// key-value store and the distributed locker.
pub trait Shared: Send + Sync + 'static {
    fn store(&self) -> std::sync::Arc<dyn Store>;
    fn lockers(&self) -> std::sync::Arc<dyn Lockers>;
}

/// The cluster membership collaborator. Only this contract is implemented
/// by FNS; the concrete gossip/consensus protocol behind it is out of
/// scope (spec.md §1).
#[async_trait]
pub trait Cluster: Send + Sync + 'static {
    async fn join(&self) -> Result<(), FnsError>;

    async fn leave(&self) -> Result<(), FnsError>;

    async fn add_service(&self, info: ServiceInfo) -> Result<(), FnsError>;

    /// Hands back the receiving half of the node event channel. Channel
    /// closure terminates the membership loop. Consumed exactly once.
    fn node_events(&self) -> tokio::sync::mpsc::Receiver<MembershipEvent>;

    fn shared(&self) -> std::sync::Arc<dyn Shared>;
}
