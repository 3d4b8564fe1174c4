//! `fns-core`: wire types, error taxonomy, and the trait contracts the FNS
//! clustered function runtime is built from.
//!
//! This crate holds only contracts and small value types — no concrete
//! transport, cluster gossip, or store implementation lives here. Those
//! live in `fns-store` (the shared store + lockers), `fns-barrier` (the
//! singleflight barrier), `fns-rpc` (the remote call envelope) and
//! `fns-manager` (the endpoint manager + membership event loop), each
//! consuming the contracts defined here.

pub mod cluster;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod errorwindow;
pub mod future;
pub mod locker;
pub mod node;
pub mod options;
pub mod service;
pub mod store;
pub mod transport;
pub mod wire;

pub use cluster::{Cluster, MembershipEvent, Shared};
pub use context::{CallContext, Cancellation, Deadline};
pub use dispatch::{Dispatch, DispatchRejected, TokioDispatch};
pub use error::{ErrorCause, FnsError, FnsResult};
pub use errorwindow::ErrorWindow;
pub use future::{BoxFuture, LocalBoxFuture};
pub use locker::{Locker, Lockers};
pub use node::{FnInfo, Node, ServiceInfo};
pub use options::{headers, RequestOptions};
pub use service::{LocalEndpoints, LocalService};
pub use store::Store;
pub use transport::{status, Dialer, RequestHandler, TransportClient, TransportResponse};
pub use wire::{Entry, RequestBody, ResponseBody, SPAN_ATTACHMENT_KEY};
