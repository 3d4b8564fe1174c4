//! Pure in-process singleflight coalescing (spec.md §4.4 "Standalone
//! mode"). Keyed by the string form of `key`; an empty key normalizes to
//! `"-"`.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use fns_core::FnsError;
use tokio::sync::OnceCell;

/// Normalizes the empty key to `"-"`, uniformly across `Do` and `Forget`
/// (spec.md §8 boundary behavior).
pub fn normalize_key(key: &str) -> String {
    if key.is_empty() {
        "-".to_string()
    } else {
        key.to_string()
    }
}

type Slot = Arc<OnceCell<Result<Vec<u8>, FnsError>>>;

/// A standalone singleflight group: at most one concurrent execution of
/// `fn` per key within this process.
#[derive(Default)]
pub struct Group {
    inflight: DashMap<String, Slot>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `producer` at most once per key among all concurrently waiting
    /// callers; every caller observes the same result.
    pub async fn do_call<F, Fut>(&self, key: &str, producer: F) -> Result<Vec<u8>, FnsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FnsError>>,
    {
        let key = normalize_key(key);
        let slot: Slot = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = slot.get_or_init(producer).await.clone();

        // Self-clean once settled so the *next* distinct call re-executes
        // `producer` instead of replaying a stale cached result forever;
        // only remove the entry if it is still the generation we joined
        // (a concurrent `Forget` may already have replaced it).
        self.inflight.remove_if(&key, |_, current| Arc::ptr_eq(current, &slot));

        result
    }

    /// Drops the group key for `key` so the next arrival re-runs `fn`.
    pub fn forget(&self, key: &str) {
        let key = normalize_key(key);
        self.inflight.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let group = Arc::new(Group::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let group = Arc::clone(&group);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                group
                    .do_call("k", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(b"42".to_vec())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"42".to_vec());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forget_causes_next_call_to_re_execute() {
        let group = Group::new();
        let calls = AtomicUsize::new(0);

        group
            .do_call("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(b"1".to_vec())
            })
            .await
            .unwrap();

        group.forget("k");

        group
            .do_call("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(b"2".to_vec())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_key_normalizes_to_dash() {
        assert_eq!(normalize_key(""), "-");
        assert_eq!(normalize_key("x"), "x");
    }
}
