//! `fns-hosting`: process bootstrap concerns that sit above the endpoint
//! manager — layered configuration, host-address discovery, and graceful
//! shutdown sequencing (spec.md §4.1's `Shutdown(ctx)` one-liner,
//! SPEC_FULL.md §10).
//!
//! Adapted from `spark-hosting`'s role as the crate that assembles a
//! runnable host out of `spark-core` contracts, trimmed to the single
//! `std` + `tokio` deployment shape FNS targets.

pub mod config;
pub mod host;
pub mod shutdown;

pub use config::{BarrierSettings, ConfigBuilder, ConfigError, EnvLayer, FileLayer, FnsConfig};
pub use host::{DefaultHostRetriever, EnvHostRetriever, HostRetriever, HostRetrieverRegistry};
pub use shutdown::{
    GracefulShutdownCoordinator, ShutdownOutcome, ShutdownRecord, ShutdownReport, ShutdownTarget,
};
