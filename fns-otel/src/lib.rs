//! `fns-otel`: tracing/logging bootstrap and health-state observability,
//! adapted from `spark-otel`'s zero-configuration install pattern and
//! health-probe re-export.
//!
//! Unlike `spark-otel`, this crate owns its health-snapshot logic rather
//! than merely re-exporting a core contract: `fns-core` has no
//! observability module of its own (spec.md §1 lists metrics/document
//! generation as non-goals), so `HealthSnapshot` is built directly from
//! `fns-manager::Registrations`.

pub mod health;
pub mod logging;

pub use health::{ComponentHealth, HealthSnapshot};
pub use logging::{install, Error};
