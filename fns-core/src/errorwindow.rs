//! Sliding error-count window shared by `Endpoint` and `Fn` (spec.md §3,
//! §4.1's ACTIVE↔DEGRADED transition).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(10);
const UNHEALTHY_THRESHOLD: usize = 5;

/// Counts failures observed in the trailing 10-second window. `isHealth`
/// (spec.md §3) is `value() < 5`.
#[derive(Debug)]
pub struct ErrorWindow {
    failures: Mutex<VecDeque<Instant>>,
}

impl Default for ErrorWindow {
    fn default() -> Self {
        Self {
            failures: Mutex::new(VecDeque::new()),
        }
    }
}

impl ErrorWindow {
    pub fn new() -> Self {
        Self::default()
    }

    fn evict_expired(queue: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = queue.front() {
            if now.duration_since(*front) > WINDOW {
                queue.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut queue = self.failures.lock();
        Self::evict_expired(&mut queue, now);
        queue.push_back(now);
    }

    /// A successful call lets the window decay naturally (old entries age
    /// out); this just forces an eviction pass so `value()` reflects reality
    /// immediately rather than on the next failure.
    pub fn record_success(&self) {
        let now = Instant::now();
        let mut queue = self.failures.lock();
        Self::evict_expired(&mut queue, now);
    }

    pub fn value(&self) -> usize {
        let now = Instant::now();
        let mut queue = self.failures.lock();
        Self::evict_expired(&mut queue, now);
        queue.len()
    }

    pub fn is_healthy(&self) -> bool {
        self.value() < UNHEALTHY_THRESHOLD
    }
}
