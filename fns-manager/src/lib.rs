//! `fns-manager`: the endpoint manager, the version-aware registration
//! table, and the membership event loop that keeps it in sync with the
//! cluster (spec.md §4.1, §4.2).
//!
//! Grounded on `spark-switch::applications::registrar`/`::location` for
//! the registration-table shape and `spark-core::cluster` for the
//! membership/discovery contracts this crate consumes via `fns-core`.

pub mod endpoint;
pub mod manager;
pub mod membership;
pub mod table;
pub mod version;

pub use endpoint::{Endpoint, EndpointState, Fn};
pub use manager::{local_call_context, EndpointInfo, EndpointManager, Resolved};
pub use membership::run_membership_loop;
pub use table::{Endpoints, Registrations};
pub use version::VersionEndpoints;
