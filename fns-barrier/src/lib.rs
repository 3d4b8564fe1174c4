//! `fns-barrier`: the singleflight request coalescer (spec.md §4.4), in two
//! layers — a pure in-process [`Group`] and a cluster-wide
//! [`ClusterBarrier`] built on top of it plus a shared store and locker.

pub mod cluster;
pub mod config;
pub mod scanner;
pub mod standalone;
pub mod value;

pub use cluster::ClusterBarrier;
pub use config::{BarrierConfig, PollPlan};
pub use scanner::{scan_json, scan_raw};
pub use standalone::{normalize_key, Group};
pub use value::{BarrierValue, CodedErrorPayload};
