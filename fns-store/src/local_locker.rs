//! A process-wide `Lockers` implementation: a map from key to a
//! ref-counted mutex, with `Lock` racing acquisition against a timer
//! driven by `ttl` (spec.md §4.5 "Local locker algorithm").

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fns_core::{Deadline, FnsError, Locker, Lockers};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct LockEntry {
    semaphore: Arc<Semaphore>,
    refcount: AtomicUsize,
}

impl LockEntry {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            refcount: AtomicUsize::new(0),
        }
    }
}

#[derive(Clone, Default)]
pub struct LocalLockers {
    entries: Arc<DashMap<String, Arc<LockEntry>>>,
}

impl LocalLockers {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_for(&self, key: &str) -> Arc<LockEntry> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(LockEntry::new()));
        entry.refcount.fetch_add(1, Ordering::SeqCst);
        Arc::clone(&entry)
    }

    /// The release-channel equivalent: decrements the refcount and drops
    /// the map entry once nobody else references this key.
    fn release(&self, key: &str) {
        if let Some(entry) = self.entries.get(key) {
            if entry.refcount.fetch_sub(1, Ordering::SeqCst) == 1 {
                drop(entry);
                self.entries.remove_if(key, |_, e| {
                    e.refcount.load(Ordering::SeqCst) == 0
                });
            }
        }
    }
}

#[async_trait]
impl Lockers for LocalLockers {
    async fn acquire(&self, key: &str, ttl: Duration) -> Arc<dyn Locker> {
        Arc::new(LocalLocker {
            key: key.to_string(),
            registry: self.clone(),
            entry: self.entry_for(key),
            ttl,
            permit: SyncMutex::new(None),
        })
    }
}

pub struct LocalLocker {
    key: String,
    registry: LocalLockers,
    entry: Arc<LockEntry>,
    ttl: Duration,
    permit: SyncMutex<Option<OwnedSemaphorePermit>>,
}

#[async_trait]
impl Locker for LocalLocker {
    async fn lock(&self, deadline: Deadline) -> Result<(), FnsError> {
        let semaphore = Arc::clone(&self.entry.semaphore);
        let wait = deadline.clamp(self.ttl);

        let permit = if self.ttl.is_zero() {
            // ttl=0 means "no timeout": block indefinitely on the mutex.
            semaphore
                .acquire_owned()
                .await
                .map_err(|_| FnsError::warning("lock semaphore closed"))?
        } else {
            match tokio::time::timeout(wait, semaphore.acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(FnsError::warning("lock semaphore closed")),
                Err(_) => {
                    return Err(FnsError::LockTimeout {
                        key: self.key.clone(),
                        ttl_millis: self.ttl.as_millis() as u64,
                    });
                }
            }
        };

        *self.permit.lock() = Some(permit);
        Ok(())
    }

    async fn unlock(&self) {
        let held = self.permit.lock().take();
        drop(held);
    }
}

impl Drop for LocalLocker {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
