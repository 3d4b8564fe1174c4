//! The shared key-value store contract (spec.md §4.5).

use async_trait::async_trait;
use std::time::Duration;

use crate::error::FnsError;

/// `Get/Set/SetWithTTL/Incr/Expire/Remove/Close`. Missing keys return
/// `(None, false)` rather than an error; a TTL of zero (or omitted) means
/// "no expiry".
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FnsError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), FnsError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), FnsError>;

    /// Atomically increments the counter stored at `key` by `delta` and
    /// returns the new value. The counter representation is distinct from
    /// byte values; a `Set` on the same key overwrites the counter.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, FnsError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, FnsError>;

    async fn remove(&self, key: &str) -> Result<bool, FnsError>;

    async fn close(&self) -> Result<(), FnsError>;
}
