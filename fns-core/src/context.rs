//! Per-call context: cancellation, deadline, tracing, and the context user
//! values carried across a remote call (spec.md §3, §5 "Cancellation and
//! timeouts").

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// A cooperatively-checked cancellation signal. Every suspending operation
/// in the manager/barrier/locker consumes one of these alongside its
/// deadline.
#[derive(Clone, Debug)]
pub struct Cancellation {
    inner: Arc<CancellationInner>,
}

#[derive(Debug)]
struct CancellationInner {
    notify: Notify,
    cancelled: std::sync::atomic::AtomicBool,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationInner {
                notify: Notify::new(),
                cancelled: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner
            .cancelled
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

/// The deadline a suspending operation must respect in addition to its own
/// `ttl` (e.g. locker acquisition, per spec.md §5: "context deadline clamps
/// TTL").
#[derive(Clone, Copy, Debug)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(duration: Duration) -> Self {
        Self(Some(Instant::now() + duration))
    }

    /// Clamps `ttl` to whatever remains before this deadline, per spec.md
    /// §5's locker clamping rule.
    pub fn clamp(&self, ttl: Duration) -> Duration {
        match self.0 {
            None => ttl,
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                remaining.min(ttl)
            }
        }
    }
}

/// Opaque bag of service components an endpoint may attach to a call
/// (spec.md §4.1 step 5: "if the endpoint carries service components,
/// attach them to the call context").
#[derive(Clone, Default)]
pub struct Components {
    values: Vec<(String, Arc<dyn Any + Send + Sync>)>,
}

impl Components {
    pub fn insert(&mut self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.values.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// The call-scoped context threaded through `Manager::Request` and the
/// remote call envelope.
#[derive(Clone)]
pub struct CallContext {
    pub context_user_values: Vec<(String, String)>,
    pub cancellation: Cancellation,
    pub deadline: Deadline,
    /// Present once a trace span has been started for this call.
    pub trace_id: Option<String>,
    pub components: Components,
    /// `true` once the call has been rebuilt on the server side from an
    /// inbound wire request (`WithInternalRequest`).
    pub internal: bool,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            context_user_values: Vec::new(),
            cancellation: Cancellation::new(),
            deadline: Deadline::none(),
            trace_id: None,
            components: Components::default(),
            internal: false,
        }
    }
}

impl CallContext {
    pub fn with_internal_request(mut self) -> Self {
        self.internal = true;
        self
    }
}
