//! Cluster-mode singleflight barrier (spec.md §4.4 "Cluster mode").
//!
//! Layered on top of [`Group`]: the in-process group coalesces concurrent
//! callers on *this* node down to one cluster step, and the cluster step
//! itself elects a single winner across the whole cluster via the shared
//! store and a distributed lock.
//!
//! Election, one round:
//! 1. Acquire the per-key lock.
//! 2. Read the store entry for the key.
//!    - Absent: we are the elected runner. Write `Pending`, release the
//!      lock, run `producer`, write the decided `Success*`/`Failure*`
//!      value, and return it.
//!    - Present: someone else is (or was) running it. Release the lock and
//!      poll the store until it reports a decided value, restarting the
//!      whole round if polling is exhausted or the entry is reclaimed by a
//!      `Forget` (tag `G`) while we wait.
//!
//! spec.md §9 left the "what if a poller never sees a decision" open
//! question unresolved; this implementation bounds it to exactly one extra
//! round (`MAX_RESTARTS = 1`) rather than recursing without limit, and
//! reports [`FnsError::Warning`] if the second round also exhausts its
//! polling budget.

use std::future::Future;
use std::sync::Arc;

use fns_core::{Deadline, FnsError, Locker, Lockers, Store};
use tracing::warn;

use crate::config::BarrierConfig;
use crate::standalone::{normalize_key, Group};
use crate::value::{BarrierValue, CodedErrorPayload};

const KEY_PREFIX: &str = "fns/barrier/";
const MAX_RESTARTS: u32 = 1;

/// Outcome of a single election round.
enum Round {
    /// Decided, one way or the other.
    Decided(BarrierValue),
    /// Polling was exhausted, or the entry was forgotten mid-poll; the
    /// caller should try another round.
    Restart,
}

pub struct ClusterBarrier {
    store: Arc<dyn Store>,
    lockers: Arc<dyn Lockers>,
    group: Group,
    config: BarrierConfig,
}

impl ClusterBarrier {
    pub fn new(store: Arc<dyn Store>, lockers: Arc<dyn Lockers>, config: BarrierConfig) -> Self {
        Self {
            store,
            lockers,
            group: Group::new(),
            config,
        }
    }

    fn full_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    /// Runs `producer` under cluster-wide singleflight, coalescing local
    /// callers through the in-process group first.
    pub async fn call<F, Fut>(&self, key: &str, producer: F) -> Result<Vec<u8>, FnsError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, FnsError>> + Send + 'static,
    {
        let norm = normalize_key(key);
        let store = Arc::clone(&self.store);
        let lockers = Arc::clone(&self.lockers);
        let config = self.config;
        let producer = Arc::new(producer);

        self.group
            .do_call(&norm, move || {
                run_cluster_step(store, lockers, config, norm, producer)
            })
            .await
    }

    /// Clears both the local group slot and the shared store entry so the
    /// next `call` re-elects from scratch.
    pub async fn forget(&self, key: &str) -> Result<(), FnsError> {
        let norm = normalize_key(key);
        self.group.forget(&norm);
        self.store
            .set_with_ttl(&Self::full_key(&norm), BarrierValue::Forgotten.encode(), self.config.ttl)
            .await
    }
}

async fn run_cluster_step<F, Fut>(
    store: Arc<dyn Store>,
    lockers: Arc<dyn Lockers>,
    config: BarrierConfig,
    key: String,
    producer: Arc<F>,
) -> Result<Vec<u8>, FnsError>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>, FnsError>> + Send + 'static,
{
    let full_key = ClusterBarrier::full_key(&key);

    for attempt in 0..=MAX_RESTARTS {
        match run_round(&store, &lockers, &config, &full_key, producer.as_ref()).await? {
            Round::Decided(value) => return value_to_result(value),
            Round::Restart if attempt < MAX_RESTARTS => {
                warn!(key = %key, "barrier round found no decision, restarting once");
            }
            Round::Restart => {
                return Err(FnsError::warning(format!(
                    "barrier `{key}` produced no decision after {} rounds",
                    MAX_RESTARTS + 1
                )));
            }
        }
    }
    unreachable!("loop above always returns by the final iteration")
}

async fn run_round<F, Fut>(
    store: &Arc<dyn Store>,
    lockers: &Arc<dyn Lockers>,
    config: &BarrierConfig,
    full_key: &str,
    producer: &F,
) -> Result<Round, FnsError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<u8>, FnsError>>,
{
    let locker = lockers.acquire(full_key, config.ttl).await;
    locker.lock(Deadline::after(config.ttl)).await?;

    let existing = store.get(full_key).await?;
    if existing.is_some() {
        locker.unlock().await;
        return Ok(poll_for_decision(store, config, full_key).await?);
    }

    store
        .set_with_ttl(full_key, BarrierValue::Pending.encode(), config.ttl)
        .await?;
    locker.unlock().await;

    let outcome = producer().await;
    let value = encode_outcome(outcome);
    store.set_with_ttl(full_key, value.encode(), config.ttl).await?;
    Ok(Round::Decided(value))
}

async fn poll_for_decision(
    store: &Arc<dyn Store>,
    config: &BarrierConfig,
    full_key: &str,
) -> Result<Round, FnsError> {
    let plan = config.poll_plan();
    for _ in 0..plan.loops {
        match store.get(full_key).await? {
            None => return Ok(Round::Restart),
            Some(raw) => {
                let value = BarrierValue::decode(&raw)?;
                if value.is_forgotten() {
                    return Ok(Round::Restart);
                }
                if value.is_decided() {
                    return Ok(Round::Decided(value));
                }
            }
        }
        tokio::time::sleep(plan.interval).await;
    }
    Ok(Round::Restart)
}

fn encode_outcome(outcome: Result<Vec<u8>, FnsError>) -> BarrierValue {
    match outcome {
        Ok(bytes) if bytes.is_empty() => BarrierValue::SuccessNil,
        Ok(bytes) => BarrierValue::SuccessValue(bytes),
        Err(FnsError::Coded { code, message }) => {
            BarrierValue::FailureCoded(CodedErrorPayload { code, message })
        }
        Err(other) => BarrierValue::FailureString(other.to_string()),
    }
}

fn value_to_result(value: BarrierValue) -> Result<Vec<u8>, FnsError> {
    match value {
        BarrierValue::SuccessNil => Ok(Vec::new()),
        BarrierValue::SuccessValue(bytes) => Ok(bytes),
        BarrierValue::FailureCoded(payload) => Err(FnsError::Coded {
            code: payload.code,
            message: payload.message,
        }),
        BarrierValue::FailureString(message) => Err(FnsError::warning(message)),
        BarrierValue::Pending | BarrierValue::Forgotten => {
            Err(FnsError::warning("barrier resolved to a non-terminal state"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fns_store::{LocalLockers, LocalStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_config() -> BarrierConfig {
        BarrierConfig {
            ttl: Duration::from_millis(500),
            interval: Duration::from_millis(20),
            standalone: false,
        }
    }

    #[tokio::test]
    async fn single_caller_runs_producer_and_returns_its_value() {
        let barrier = ClusterBarrier::new(
            Arc::new(LocalStore::new()),
            Arc::new(LocalLockers::new()),
            test_config(),
        );
        let result = barrier.call("k", || async { Ok(b"ok".to_vec()) }).await;
        assert_eq!(result.unwrap(), b"ok".to_vec());
    }

    #[tokio::test]
    async fn concurrent_callers_across_one_node_share_a_single_execution() {
        let barrier = Arc::new(ClusterBarrier::new(
            Arc::new(LocalStore::new()),
            Arc::new(LocalLockers::new()),
            test_config(),
        ));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let barrier = Arc::clone(&barrier);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                barrier
                    .call("shared", move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Ok(b"shared-result".to_vec())
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"shared-result".to_vec());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_round_trips_as_a_coded_error() {
        let barrier = ClusterBarrier::new(
            Arc::new(LocalStore::new()),
            Arc::new(LocalLockers::new()),
            test_config(),
        );
        let result = barrier
            .call("fail", || async {
                Err(FnsError::Coded {
                    code: "fns.not_found".into(),
                    message: "missing".into(),
                })
            })
            .await;
        match result.unwrap_err() {
            FnsError::Coded { code, .. } => assert_eq!(code, "fns.not_found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forget_allows_a_second_election() {
        let barrier = ClusterBarrier::new(
            Arc::new(LocalStore::new()),
            Arc::new(LocalLockers::new()),
            test_config(),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_a = Arc::clone(&calls);
        barrier
            .call("k", move || {
                let calls = Arc::clone(&calls_a);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(b"first".to_vec())
                }
            })
            .await
            .unwrap();

        barrier.forget("k").await.unwrap();

        let calls_b = Arc::clone(&calls);
        let second = barrier
            .call("k", move || {
                let calls = Arc::clone(&calls_b);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(b"second".to_vec())
                }
            })
            .await
            .unwrap();

        assert_eq!(second, b"second".to_vec());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
