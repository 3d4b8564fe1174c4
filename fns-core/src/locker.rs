//! The distributed locker contract (spec.md §4.5).

use async_trait::async_trait;
use std::time::Duration;

use crate::context::Deadline;
use crate::error::FnsError;

/// A named mutual-exclusion handle acquired for up to `ttl`. Ownership is
/// by-acquisition, not by-task: whoever calls `Acquire` must be the one
/// that later calls `Lock`/holds the returned handle, and the handle can be
/// freely moved to whichever task eventually calls `unlock`.
#[async_trait]
pub trait Locker: Send + Sync + 'static {
    /// Blocks until the key is held exclusively, or fails with
    /// `FnsError::LockTimeout` once `ttl` elapses. `deadline` additionally
    /// clamps how long this call is willing to wait.
    async fn lock(&self, deadline: Deadline) -> Result<(), FnsError>;

    /// Idempotent: unlocking an already-released locker is a no-op.
    async fn unlock(&self);
}

#[async_trait]
pub trait Lockers: Send + Sync + 'static {
    async fn acquire(&self, key: &str, ttl: Duration) -> std::sync::Arc<dyn Locker>;
}
