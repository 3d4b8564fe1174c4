//! The transport boundary consumed (not implemented) by the remote call
//! envelope: an HTTP-like dialer/client pair plus a response status code
//! (spec.md §1 non-goals, §6).

use async_trait::async_trait;

use crate::error::FnsError;
use crate::wire::Entry;

/// Reply statuses the remote call envelope understands (spec.md §6).
pub mod status {
    pub const OK: u16 = 200;
    pub const TOO_EARLY: u16 = 425;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const UNAVAILABLE: u16 = 503;
    pub const CODE_ERROR: u16 = 555;
    pub const INTERNAL_FAILURE: u16 = 666;
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub entry: Entry,
}

/// A dialed connection to one remote node. An `Endpoint` owns its client
/// exclusively; `Fn`s share a reference to it but never close it
/// independently (spec.md §9 "Ownership of transport clients").
#[async_trait]
pub trait TransportClient: Send + Sync + 'static {
    async fn call(&self, request: Entry) -> Result<TransportResponse, FnsError>;

    /// A single health-probe round trip; the membership loop retries this
    /// up to 10 times at 1s spacing (spec.md §4.2).
    async fn health_check(&self) -> bool;

    async fn close(&self);
}

/// Dials a node's advertised address and hands back a client, per the
/// membership-loop Add path (spec.md §4.2 step 1).
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, address: &str) -> Result<std::sync::Arc<dyn TransportClient>, FnsError>;
}

/// The server-side counterpart: whatever HTTP-like listener hosts
/// `InternalHandler::handle` is external to this crate; this trait is the
/// minimal seam the envelope needs to be transport-agnostic in tests.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Entry) -> TransportResponse;
}
