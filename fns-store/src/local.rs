//! An in-process `Store` implementation: an ordered map keyed by string,
//! each entry tagged bytes-or-counter with an optional deadline, plus a
//! background shrink task that periodically evicts expired entries
//! (spec.md §4.5 "Local store behavior"). Grounded on
//! `spark-switch::applications::location::LocationStore`'s
//! `Arc<DashMap<..>>` wrapper idiom.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use fns_core::{FnsError, Store};

use crate::value::{StoreEntry, StoredValue};

#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<DashMap<String, StoreEntry>>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Spawns the background eviction task, returning a handle the caller
    /// can drop to stop it. Not started automatically: `fns-hosting`
    /// decides the shrink interval from config.
    pub fn spawn_shrink_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                inner.retain(|_, entry| !entry.is_expired(now));
            }
        })
    }

    fn deadline_for(ttl: Duration) -> Option<Instant> {
        if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        }
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FnsError> {
        let now = Instant::now();
        match self.inner.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                StoredValue::Bytes(bytes) => Ok(Some(bytes.clone())),
                StoredValue::Counter(n) => Ok(Some(n.to_string().into_bytes())),
            },
            Some(_) => {
                drop(self.inner.remove(key));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), FnsError> {
        self.inner.insert(
            key.to_string(),
            StoreEntry {
                value: StoredValue::Bytes(value),
                deadline: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), FnsError> {
        self.inner.insert(
            key.to_string(),
            StoreEntry {
                value: StoredValue::Bytes(value),
                deadline: Self::deadline_for(ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, FnsError> {
        let mut entry = self
            .inner
            .entry(key.to_string())
            .or_insert_with(|| StoreEntry {
                value: StoredValue::Counter(0),
                deadline: None,
            });
        let now = Instant::now();
        if entry.is_expired(now) {
            entry.value = StoredValue::Counter(0);
            entry.deadline = None;
        }
        let next = match entry.value {
            StoredValue::Counter(n) => n + delta,
            StoredValue::Bytes(_) => delta,
        };
        entry.value = StoredValue::Counter(next);
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, FnsError> {
        match self.inner.get_mut(key) {
            Some(mut entry) => {
                entry.deadline = Self::deadline_for(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, FnsError> {
        Ok(self.inner.remove(key).is_some())
    }

    async fn close(&self) -> Result<(), FnsError> {
        self.inner.clear();
        Ok(())
    }
}
