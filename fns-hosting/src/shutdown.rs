//! Graceful shutdown sequencing (SPEC_FULL.md §10), supplementing
//! spec.md §4.1's one-line `Shutdown(ctx)` description with the actual
//! phase ordering a deployment needs: stop accepting new `Request`s,
//! drain in-flight dispatches against a deadline, then leave the
//! cluster and close the store/locker.
//!
//! Grounded on `spark_hosting::shutdown::GracefulShutdownCoordinator`'s
//! register-then-race shape, trimmed to `tokio::time::timeout` racing
//! each target instead of the teacher's hand-rolled `no_std`
//! `TimeoutFuture` — FNS targets `std` + `tokio`, so there is no reason
//! to hand-roll a timer/future select.

use std::borrow::Cow;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fns_core::FnsError;
use fns_core::future::BoxFuture;

/// How one registered target's shutdown wait resolved.
#[derive(Debug)]
pub enum ShutdownOutcome {
    Completed,
    Failed(FnsError),
    TimedOut,
}

#[derive(Debug)]
pub struct ShutdownRecord {
    pub label: Cow<'static, str>,
    pub outcome: ShutdownOutcome,
    pub elapsed: Duration,
}

/// The aggregate result of one [`GracefulShutdownCoordinator::shutdown`]
/// run, in registration order.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub records: Vec<ShutdownRecord>,
}

impl ShutdownReport {
    pub fn all_completed(&self) -> bool {
        self.records
            .iter()
            .all(|record| matches!(record.outcome, ShutdownOutcome::Completed))
    }
}

/// One long-lived collaborator to notify and wait on during shutdown —
/// the cluster-leave/local-service pair behind `EndpointManager::shutdown`,
/// the store, the locker, or anything else a host assembles.
pub struct ShutdownTarget {
    label: Cow<'static, str>,
    future: BoxFuture<'static, Result<(), FnsError>>,
}

impl ShutdownTarget {
    pub fn new<F>(label: impl Into<Cow<'static, str>>, future: F) -> Self
    where
        F: Future<Output = Result<(), FnsError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: Box::pin(future),
        }
    }
}

/// Coordinates the shutdown sequence: flips an `accepting` flag that a
/// server loop polls before admitting new requests, then triggers and
/// awaits every registered target with a shared deadline, recording
/// completion, failure, or a forced timeout for each.
pub struct GracefulShutdownCoordinator {
    accepting: Arc<AtomicBool>,
    targets: Vec<ShutdownTarget>,
}

impl GracefulShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            accepting: Arc::new(AtomicBool::new(true)),
            targets: Vec::new(),
        }
    }

    /// The flag a server's accept loop should check before admitting a
    /// new `Request`; cloning it out lets the loop and the coordinator
    /// share ownership without the coordinator borrowing the loop.
    pub fn accepting_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.accepting)
    }

    pub fn register(&mut self, target: ShutdownTarget) {
        self.targets.push(target);
    }

    /// Stops accepting new work, then waits on every registered target
    /// in registration order, racing each against `deadline`. A target
    /// that times out is recorded as [`ShutdownOutcome::TimedOut`] and
    /// abandoned (its future is dropped) rather than blocking the rest
    /// of the sequence.
    pub async fn shutdown(mut self, deadline: Duration) -> ShutdownReport {
        self.accepting.store(false, Ordering::SeqCst);
        let targets = std::mem::take(&mut self.targets);

        let mut records = Vec::with_capacity(targets.len());
        for target in targets {
            let start = Instant::now();
            let outcome = match tokio::time::timeout(deadline, target.future).await {
                Ok(Ok(())) => ShutdownOutcome::Completed,
                Ok(Err(err)) => ShutdownOutcome::Failed(err),
                Err(_) => ShutdownOutcome::TimedOut,
            };
            records.push(ShutdownRecord {
                label: target.label,
                outcome,
                elapsed: start.elapsed(),
            });
        }

        ShutdownReport { records }
    }
}

impl Default for GracefulShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn completed_targets_are_recorded_in_order() {
        let mut coordinator = GracefulShutdownCoordinator::new();
        coordinator.register(ShutdownTarget::new("first", async { Ok(()) }));
        coordinator.register(ShutdownTarget::new("second", async { Ok(()) }));

        let report = coordinator.shutdown(Duration::from_secs(1)).await;

        assert!(report.all_completed());
        assert_eq!(report.records[0].label, "first");
        assert_eq!(report.records[1].label, "second");
    }

    #[tokio::test]
    async fn a_target_that_outlives_the_deadline_is_marked_timed_out() {
        let mut coordinator = GracefulShutdownCoordinator::new();
        coordinator.register(ShutdownTarget::new("slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));

        let report = coordinator.shutdown(Duration::from_millis(20)).await;

        assert!(matches!(
            report.records[0].outcome,
            ShutdownOutcome::TimedOut
        ));
    }

    #[tokio::test]
    async fn a_failing_target_does_not_stop_the_rest_of_the_sequence() {
        let mut coordinator = GracefulShutdownCoordinator::new();
        coordinator.register(ShutdownTarget::new("broken", async {
            Err(FnsError::warning("boom"))
        }));
        coordinator.register(ShutdownTarget::new("fine", async { Ok(()) }));

        let report = coordinator.shutdown(Duration::from_secs(1)).await;

        assert!(matches!(
            report.records[0].outcome,
            ShutdownOutcome::Failed(_)
        ));
        assert!(matches!(
            report.records[1].outcome,
            ShutdownOutcome::Completed
        ));
    }

    #[tokio::test]
    async fn shutdown_flips_the_accepting_flag_before_waiting() {
        let coordinator = GracefulShutdownCoordinator::new();
        let flag = coordinator.accepting_flag();
        assert!(flag.load(Ordering::SeqCst));
        coordinator.shutdown(Duration::from_secs(1)).await;
        assert!(!flag.load(Ordering::SeqCst));
    }
}
