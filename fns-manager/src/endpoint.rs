//! `Endpoint` and `Fn` (spec.md §3): a remote service instance bound to a
//! dialed transport client, and one callable function on it.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use fns_core::{ErrorWindow, FnInfo, FnsError, RequestBody, RequestOptions, TransportClient};
use fns_rpc::{Codec, RemoteCallRequest};
use semver::Version;

/// `PENDING → ACTIVE → (DEGRADED ↔ ACTIVE) → SHUTDOWN` (spec.md §4.1). An
/// `Endpoint` is only ever constructed once the membership loop has
/// already dialed and health-probed it, so it starts life `Active` —
/// `Pending` exists as a named state for documentation/observability
/// purposes (see `fns-otel::HealthSnapshot`) even though no code
/// constructs an endpoint while still in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EndpointState {
    Pending = 0,
    Active = 1,
    Degraded = 2,
    Shutdown = 3,
}

impl From<u8> for EndpointState {
    fn from(value: u8) -> Self {
        match value {
            0 => EndpointState::Pending,
            1 => EndpointState::Active,
            2 => EndpointState::Degraded,
            _ => EndpointState::Shutdown,
        }
    }
}

/// One remotely callable function on an `Endpoint` (spec.md §3, §4.3).
pub struct Fn {
    pub endpoint_name: String,
    pub name: String,
    pub internal: bool,
    pub readonly: bool,
    pub path: String,
    error_window: ErrorWindow,
    health_flag: AtomicBool,
    client: Arc<dyn TransportClient>,
}

impl Fn {
    pub fn new(endpoint_name: &str, info: &FnInfo, client: Arc<dyn TransportClient>) -> Self {
        Self {
            endpoint_name: endpoint_name.to_string(),
            name: info.name.clone(),
            internal: info.internal,
            readonly: info.readonly,
            path: format!("/{endpoint_name}/{}", info.name),
            error_window: ErrorWindow::new(),
            health_flag: AtomicBool::new(true),
            client,
        }
    }

    /// `Enable` reflects the health flag (spec.md §3).
    pub fn enabled(&self) -> bool {
        self.health_flag.load(Ordering::SeqCst)
    }

    fn record_success(&self) {
        self.error_window.record_success();
        if self.error_window.value() == 0 {
            self.health_flag.store(true, Ordering::SeqCst);
        }
    }

    fn record_failure(&self) {
        self.error_window.record_failure();
        if self.error_window.value() >= 5 {
            self.health_flag.store(false, Ordering::SeqCst);
        }
    }

    /// `Fn.Handle` (spec.md §4.3): performs the remote call and updates
    /// this function's own error window/health flag from the outcome,
    /// independent of the owning `Endpoint`'s error window.
    pub async fn handle(
        &self,
        codec: &dyn Codec,
        secret: &[u8],
        body: RequestBody,
        options: &RequestOptions,
    ) -> Result<Vec<u8>, FnsError> {
        let result = fns_rpc::call(
            self.client.as_ref(),
            codec,
            secret,
            RemoteCallRequest {
                service: &self.endpoint_name,
                fn_name: &self.name,
                body,
                options,
            },
        )
        .await;

        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }
}

/// A remote service instance bound to a dialed transport client.
pub struct Endpoint {
    pub address: String,
    pub id: String,
    pub version: Version,
    pub name: String,
    pub internal: bool,
    pub document: Option<String>,
    functions: Vec<Arc<Fn>>,
    running: AtomicBool,
    error_window: ErrorWindow,
    state: AtomicU8,
    client: Arc<dyn TransportClient>,
}

impl Endpoint {
    /// Built only after the membership loop's dial + health-probe
    /// succeeded at least once, so a fresh `Endpoint` starts `Active`
    /// (spec.md §4.1's `PENDING → ACTIVE` transition has already
    /// happened by the time this constructor runs).
    pub fn new(
        address: String,
        id: String,
        version: Version,
        name: String,
        internal: bool,
        document: Option<String>,
        function_infos: &[FnInfo],
        client: Arc<dyn TransportClient>,
    ) -> Self {
        let functions = function_infos
            .iter()
            .map(|info| Arc::new(Fn::new(&name, info, Arc::clone(&client))))
            .collect();
        Self {
            address,
            id,
            version,
            name,
            internal,
            document,
            functions,
            running: AtomicBool::new(true),
            error_window: ErrorWindow::new(),
            state: AtomicU8::new(EndpointState::Active as u8),
            client,
        }
    }

    pub fn function(&self, name: &str) -> Option<Arc<Fn>> {
        self.functions.iter().find(|f| f.name == name).cloned()
    }

    pub fn functions(&self) -> &[Arc<Fn>] {
        &self.functions
    }

    pub fn function_infos(&self) -> Vec<FnInfo> {
        self.functions
            .iter()
            .map(|f| FnInfo {
                name: f.name.clone(),
                readonly: f.readonly,
                internal: f.internal,
            })
            .collect()
    }

    pub fn state(&self) -> EndpointState {
        EndpointState::from(self.state.load(Ordering::SeqCst))
    }

    /// `isHealth` is `errorWindow.value() < 5` (spec.md §3).
    pub fn is_health(&self) -> bool {
        self.error_window.value() < 5
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// An endpoint is eligible for selection (`Next`/`Range`) when it is
    /// running and in the `Active` state. Gating on `state()` rather than
    /// `is_health()` directly is what lets a 503-triggered degrade clear
    /// again once calls start succeeding (spec.md §4.1's `DEGRADED ↔
    /// ACTIVE`), since a single 503 doesn't by itself push the error
    /// window past the 5-failure threshold `is_health()` checks.
    pub fn eligible(&self) -> bool {
        self.running() && self.state.load(Ordering::SeqCst) == EndpointState::Active as u8
    }

    pub fn client(&self) -> &Arc<dyn TransportClient> {
        &self.client
    }

    /// Updates the endpoint-level error window and ACTIVE↔DEGRADED state
    /// from the outcome of a call against one of its functions (spec.md
    /// §4.1's state machine). `saw_503` additionally flips DEGRADED even
    /// before the window reaches 5, matching "ACTIVE→DEGRADED ... OR on
    /// receiving status 503". Neither branch touches `running`: that flag
    /// is reserved for `shutdown()`'s terminal transition, so a
    /// 503-induced degrade can clear the same way a failure-count degrade
    /// does, once a subsequent call against this endpoint succeeds.
    pub fn record_call_result(&self, failed: bool, saw_503: bool) {
        if failed {
            self.error_window.record_failure();
            if self.error_window.value() >= 5 || saw_503 {
                self.state
                    .store(EndpointState::Degraded as u8, Ordering::SeqCst);
            }
        } else {
            self.error_window.record_success();
            if self.state.load(Ordering::SeqCst) == EndpointState::Degraded as u8
                && self.error_window.value() == 0
            {
                self.state
                    .store(EndpointState::Active as u8, Ordering::SeqCst);
            }
        }
    }

    /// Any state → SHUTDOWN, terminal (spec.md §4.1).
    pub async fn shutdown(&self) {
        self.state
            .store(EndpointState::Shutdown as u8, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.client.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fns_core::{Entry, TransportResponse};

    struct NoopClient;

    #[async_trait]
    impl TransportClient for NoopClient {
        async fn call(&self, _request: Entry) -> Result<TransportResponse, FnsError> {
            Ok(TransportResponse {
                status: fns_core::status::OK,
                entry: Entry::default(),
            })
        }
        async fn health_check(&self) -> bool {
            true
        }
        async fn close(&self) {}
    }

    fn sample_endpoint() -> Endpoint {
        Endpoint::new(
            "127.0.0.1:9000".to_string(),
            "node-1".to_string(),
            Version::new(1, 0, 0),
            "math".to_string(),
            false,
            None,
            &[FnInfo {
                name: "add".to_string(),
                readonly: true,
                internal: false,
            }],
            Arc::new(NoopClient),
        )
    }

    #[test]
    fn fresh_endpoint_starts_active_and_eligible() {
        let endpoint = sample_endpoint();
        assert_eq!(endpoint.state(), EndpointState::Active);
        assert!(endpoint.eligible());
    }

    #[test]
    fn five_failures_flip_to_degraded() {
        let endpoint = sample_endpoint();
        for _ in 0..4 {
            endpoint.record_call_result(true, false);
        }
        assert_eq!(endpoint.state(), EndpointState::Active);
        endpoint.record_call_result(true, false);
        assert_eq!(endpoint.state(), EndpointState::Degraded);
        assert!(!endpoint.eligible());
    }

    #[test]
    fn a_503_flips_to_degraded_immediately() {
        let endpoint = sample_endpoint();
        endpoint.record_call_result(true, true);
        assert_eq!(endpoint.state(), EndpointState::Degraded);
        assert!(!endpoint.eligible());
        assert!(endpoint.running());
    }

    #[test]
    fn a_503_degrade_clears_on_a_later_success() {
        let endpoint = sample_endpoint();
        endpoint.record_call_result(true, true);
        assert_eq!(endpoint.state(), EndpointState::Degraded);
        endpoint.record_call_result(false, false);
        assert_eq!(endpoint.state(), EndpointState::Active);
        assert!(endpoint.eligible());
    }

    #[test]
    fn success_after_window_empties_returns_to_active() {
        let endpoint = sample_endpoint();
        for _ in 0..5 {
            endpoint.record_call_result(true, false);
        }
        assert_eq!(endpoint.state(), EndpointState::Degraded);
        endpoint.record_call_result(false, false);
        assert_eq!(endpoint.state(), EndpointState::Active);
    }

    #[tokio::test]
    async fn shutdown_is_terminal() {
        let endpoint = sample_endpoint();
        endpoint.shutdown().await;
        assert_eq!(endpoint.state(), EndpointState::Shutdown);
        assert!(!endpoint.running());
    }
}
