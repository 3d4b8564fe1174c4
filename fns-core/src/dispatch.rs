//! The worker-pool primitive consumed (not implemented) by the endpoint
//! manager (spec.md §1 non-goals: "worker pool scheduling (consumed only
//! as a `Dispatch` primitive)").

use async_trait::async_trait;

use crate::error::FnsError;
use crate::future::BoxFuture;

/// Raised when the pool refuses a submission (spec.md §4.1 step 7:
/// "if the pool refuses, ... return `TooManyRequests`"). Distinct from
/// any `FnsError` the dispatched task itself may resolve to, so the
/// caller can tell "never ran" apart from "ran and failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRejected;

/// A worker pool that runs a boxed future to completion and hands back
/// its output, or refuses to accept it at all.
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    async fn run(
        &self,
        task: BoxFuture<'static, Result<Vec<u8>, FnsError>>,
    ) -> Result<Result<Vec<u8>, FnsError>, DispatchRejected>;
}

/// A `Dispatch` that spawns directly onto the ambient Tokio runtime and
/// never refuses. Good enough for `fns-cli`'s demo; a production host
/// would inject a bounded pool instead.
pub struct TokioDispatch;

#[async_trait]
impl Dispatch for TokioDispatch {
    async fn run(
        &self,
        task: BoxFuture<'static, Result<Vec<u8>, FnsError>>,
    ) -> Result<Result<Vec<u8>, FnsError>, DispatchRejected> {
        tokio::spawn(task).await.map_err(|_| DispatchRejected)
    }
}
