//! `EndpointManager` (spec.md §4.1): the local-vs-remote resolver that
//! composes a local service collaborator with the cluster registration
//! table.
//!
//! Grounded on `spark-switch::applications::registrar::RegistrarService`
//! for the "compose a local table with a remote one behind one façade"
//! shape, adapted to the manager's richer resolve/dispatch pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use fns_core::{
    Cancellation, CallContext, Cluster, Deadline, Dialer, Dispatch, FnsError, LocalEndpoints,
    RequestBody, RequestOptions, TokioDispatch,
};
use fns_rpc::{Codec, InboundHandler};
use tracing::Instrument;

use crate::endpoint::Endpoint;
use crate::membership::run_membership_loop;
use crate::table::Registrations;

/// What `Get` resolved a call to: the local collaborator, or a specific
/// remote `Endpoint`.
pub enum Resolved {
    Local,
    Remote(Arc<Endpoint>),
}

/// One entry in `EndpointManager::info` — a merged view of local and
/// remote endpoint identities (spec.md §4.1 `Info`: "union of local and
/// remote endpoint infos, sorted deterministically by `(name, id)`").
#[derive(Clone, Debug)]
pub struct EndpointInfo {
    pub name: String,
    /// `None` for the local collaborator, which has no node id.
    pub id: Option<String>,
    pub internal: bool,
    pub functions: Vec<fns_core::FnInfo>,
}

/// The endpoint manager: composes a local service table with the cluster
/// registration table behind one `Request`/`Get` façade.
pub struct EndpointManager {
    local: Arc<dyn LocalEndpoints>,
    registrations: Arc<Registrations>,
    cluster: Arc<dyn Cluster>,
    dialer: Arc<dyn Dialer>,
    dispatch: Arc<dyn Dispatch>,
    codec: Arc<dyn Codec>,
    secret: Vec<u8>,
    /// Resolved when `PublicFnAddress` targets the local collaborator
    /// (spec.md doesn't define what "address" means for a local
    /// resolution; a deployment that proxies to itself configures this
    /// to its own advertised address).
    self_address: Option<String>,
}

impl EndpointManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local: Arc<dyn LocalEndpoints>,
        cluster: Arc<dyn Cluster>,
        dialer: Arc<dyn Dialer>,
        codec: Arc<dyn Codec>,
        secret: impl Into<Vec<u8>>,
        self_address: Option<String>,
    ) -> Self {
        Self {
            local,
            registrations: Arc::new(Registrations::new()),
            cluster,
            dialer,
            dispatch: Arc::new(TokioDispatch),
            codec,
            secret: secret.into(),
            self_address,
        }
    }

    /// Overrides the worker pool in place of the `TokioDispatch` default,
    /// e.g. with a bounded pool that can refuse submissions under load.
    pub fn with_dispatch(mut self, dispatch: Arc<dyn Dispatch>) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn registrations(&self) -> &Arc<Registrations> {
        &self.registrations
    }

    /// `Add(service)` (spec.md §4.1).
    pub async fn add(&self, service: Arc<dyn fns_core::LocalService>) -> Result<(), FnsError> {
        let info = service.info().with_sorted_functions();
        self.local.add(service)?;
        self.cluster.add_service(info).await
    }

    /// `Info()` (spec.md §4.1).
    pub fn info(&self) -> Vec<EndpointInfo> {
        let mut infos: Vec<EndpointInfo> = self
            .local
            .info()
            .into_iter()
            .map(|info| EndpointInfo {
                name: info.name,
                id: None,
                internal: info.internal,
                functions: info.functions,
            })
            .collect();

        for (name, table) in self.registrations.snapshot().iter() {
            for endpoint in table.iter_endpoints() {
                infos.push(EndpointInfo {
                    name: name.clone(),
                    id: Some(endpoint.id.clone()),
                    internal: endpoint.internal,
                    functions: endpoint.function_infos(),
                });
            }
        }

        infos.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        infos
    }

    /// `Get` (spec.md §4.1): (1) local match wins; (2) `options.id` exact
    /// lookup; (3) `options.versions[name]` interval match; (4) newest
    /// version bucket's `Next()`.
    pub fn get(&self, name: &str, options: &RequestOptions) -> Option<Resolved> {
        if self.local.get(name).is_some() {
            return Some(Resolved::Local);
        }

        let table = self.registrations.get_service(name)?;

        if let Some(id) = &options.id {
            return table.get(id).map(Resolved::Remote);
        }

        if let Some(constraint) = options.version_for(name) {
            return table.range(constraint).map(Resolved::Remote);
        }

        table.max_one().map(Resolved::Remote)
    }

    /// `PublicFnAddress` (spec.md §4.1): like `Get`, but returns an
    /// address string and refuses if the service or the function is
    /// internal.
    pub fn public_fn_address(
        &self,
        name: &str,
        fn_name: &str,
        options: &RequestOptions,
    ) -> Result<String, FnsError> {
        match self.get(name, options) {
            Some(Resolved::Local) => {
                let service = self.local.get(name).ok_or_else(|| not_found(name, fn_name))?;
                let info = service.info();
                if info.fn_is_internal(fn_name).unwrap_or(true) {
                    return Err(not_found(name, fn_name));
                }
                self.self_address.clone().ok_or_else(|| not_found(name, fn_name))
            }
            Some(Resolved::Remote(endpoint)) => {
                let function = endpoint.function(fn_name).ok_or_else(|| not_found(name, fn_name))?;
                if endpoint.internal || function.internal {
                    return Err(not_found(name, fn_name));
                }
                Ok(endpoint.address.clone())
            }
            None => Err(not_found(name, fn_name)),
        }
    }

    /// `Request` (spec.md §4.1): the full call path.
    pub async fn request(
        &self,
        ctx: CallContext,
        name: &str,
        fn_name: &str,
        param: Vec<u8>,
        options: RequestOptions,
    ) -> Result<Vec<u8>, FnsError> {
        if name.is_empty() || fn_name.is_empty() {
            return Err(not_found(name, fn_name));
        }

        let resolved = self.get(name, &options).ok_or_else(|| not_found(name, fn_name))?;

        match resolved {
            Resolved::Local => {
                let service = self
                    .local
                    .get(name)
                    .ok_or_else(|| not_found(name, fn_name))?;
                if service.info().fn_is_internal(fn_name).is_none() {
                    return Err(not_found(name, fn_name));
                }

                let span = tracing::info_span!("fns.request", scope = "local", service = name, r#fn = fn_name);
                let task: fns_core::future::BoxFuture<'static, Result<Vec<u8>, FnsError>> = {
                    let service = Arc::clone(&service);
                    let name = name.to_string();
                    let fn_name = fn_name.to_string();
                    Box::pin(
                        async move {
                            service.handle(ctx, &fn_name, param).await.map_err(|err| {
                                FnsError::warning_from(
                                    err.to_string(),
                                    err.clone(),
                                    Some(name.clone()),
                                    Some(fn_name.clone()),
                                    Some(format!("/{name}/{fn_name}")),
                                )
                            })
                        }
                        .instrument(span.clone()),
                    )
                };

                self.run_on_pool(span, task).await
            }
            Resolved::Remote(endpoint) => {
                let function = endpoint
                    .function(fn_name)
                    .ok_or_else(|| not_found(name, fn_name))?;

                let span =
                    tracing::info_span!("fns.request", scope = "remote", service = name, r#fn = fn_name);
                let codec = Arc::clone(&self.codec);
                let secret = self.secret.clone();
                let body = RequestBody {
                    context_user_values: ctx.context_user_values.clone(),
                    params: param,
                };
                let endpoint_for_result = Arc::clone(&endpoint);
                let task: fns_core::future::BoxFuture<'static, Result<Vec<u8>, FnsError>> = Box::pin(
                    async move {
                        let result = function.handle(codec.as_ref(), &secret, body, &options).await;
                        let saw_503 = matches!(result, Err(FnsError::Unavailable { .. }));
                        endpoint_for_result.record_call_result(result.is_err(), saw_503);
                        result
                    }
                    .instrument(span.clone()),
                );

                self.run_on_pool(span, task).await
            }
        }
    }

    /// Dispatches `task` to the worker pool under `span` (spec.md §4.1
    /// step 7). `task` is already instrumented with a clone of the same
    /// span for when it actually runs; if the pool refuses before that,
    /// `task` is dropped without ever entering its span, so the refusal
    /// is recorded against `span` directly here instead.
    async fn run_on_pool(
        &self,
        span: tracing::Span,
        task: fns_core::future::BoxFuture<'static, Result<Vec<u8>, FnsError>>,
    ) -> Result<Vec<u8>, FnsError> {
        match self.dispatch.run(task).await {
            Ok(result) => result,
            Err(_) => {
                span.in_scope(|| tracing::error!("worker pool refused the request"));
                Err(FnsError::TooManyRequests {
                    reason: "worker pool refused the request".to_string(),
                })
            }
        }
    }

    /// `Listen` (spec.md §4.1): start the membership loop, then the
    /// local collaborator; on local failure, leave the cluster.
    pub async fn listen(self: &Arc<Self>) -> Result<(), FnsError> {
        self.cluster.join().await?;

        let events = self.cluster.node_events();
        let registrations = Arc::clone(&self.registrations);
        let dialer = Arc::clone(&self.dialer);
        tokio::spawn(run_membership_loop(events, registrations, dialer));

        if let Err(err) = self.local.listen().await {
            let _ = self.cluster.leave().await;
            return Err(err);
        }
        Ok(())
    }

    /// `Shutdown` (spec.md §4.1): leave the cluster, then shut down the
    /// local collaborator.
    pub async fn shutdown(&self) -> Result<(), FnsError> {
        self.cluster.leave().await?;
        self.local.shutdown().await
    }
}

#[async_trait]
impl InboundHandler for EndpointManager {
    async fn handle_internal(
        &self,
        ctx: CallContext,
        service: &str,
        fn_name: &str,
        param: Vec<u8>,
        options: RequestOptions,
    ) -> Result<Vec<u8>, FnsError> {
        self.request(ctx, service, fn_name, param, options.with_internal_request())
            .await
    }
}

fn not_found(service: &str, function: &str) -> FnsError {
    FnsError::not_found(service, function)
}

/// Used by callers that build a fresh local-invocation context without an
/// inbound wire request behind it (e.g. `fns-cli`'s demo service call).
pub fn local_call_context() -> CallContext {
    CallContext {
        cancellation: Cancellation::new(),
        deadline: Deadline::none(),
        ..CallContext::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fns_core::{
        DispatchRejected, Entry, FnInfo, LocalService, MembershipEvent, Node, ServiceInfo, Shared,
        TransportClient, TransportResponse,
    };
    use fns_rpc::JsonCodec;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    struct AddService {
        name: String,
    }

    #[async_trait]
    impl LocalService for AddService {
        fn info(&self) -> ServiceInfo {
            ServiceInfo {
                name: self.name.clone(),
                internal: false,
                functions: vec![FnInfo {
                    name: "add".to_string(),
                    readonly: true,
                    internal: false,
                }],
                document: None,
            }
        }

        async fn handle(
            &self,
            _ctx: CallContext,
            fn_name: &str,
            param: Vec<u8>,
        ) -> Result<Vec<u8>, FnsError> {
            assert_eq!(fn_name, "add");
            let n: i64 = serde_json::from_slice(&param).unwrap();
            Ok(serde_json::to_vec(&(n + 1)).unwrap())
        }
    }

    struct LocalTable {
        services: StdMutex<Vec<Arc<dyn LocalService>>>,
    }

    impl Default for LocalTable {
        fn default() -> Self {
            Self {
                services: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LocalEndpoints for LocalTable {
        fn add(&self, service: Arc<dyn LocalService>) -> Result<(), FnsError> {
            self.services.lock().unwrap().push(service);
            Ok(())
        }

        fn get(&self, name: &str) -> Option<Arc<dyn LocalService>> {
            self.services
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.info().name == name)
                .cloned()
        }

        fn info(&self) -> Vec<ServiceInfo> {
            self.services.lock().unwrap().iter().map(|s| s.info()).collect()
        }

        async fn listen(&self) -> Result<(), FnsError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), FnsError> {
            Ok(())
        }
    }

    struct NoopClient;

    #[async_trait]
    impl TransportClient for NoopClient {
        async fn call(&self, _request: Entry) -> Result<TransportResponse, FnsError> {
            unreachable!()
        }
        async fn health_check(&self) -> bool {
            true
        }
        async fn close(&self) {}
    }

    struct NoopDialer;

    #[async_trait]
    impl Dialer for NoopDialer {
        async fn dial(&self, _address: &str) -> Result<Arc<dyn TransportClient>, FnsError> {
            Ok(Arc::new(NoopClient))
        }
    }

    struct NoopShared;

    impl Shared for NoopShared {
        fn store(&self) -> Arc<dyn fns_core::Store> {
            unreachable!()
        }
        fn lockers(&self) -> Arc<dyn fns_core::Lockers> {
            unreachable!()
        }
    }

    struct NoopCluster {
        events: StdMutex<Option<mpsc::Receiver<MembershipEvent>>>,
    }

    impl NoopCluster {
        fn new() -> Self {
            let (_tx, rx) = mpsc::channel(1);
            Self {
                events: StdMutex::new(Some(rx)),
            }
        }
    }

    #[async_trait]
    impl Cluster for NoopCluster {
        async fn join(&self) -> Result<(), FnsError> {
            Ok(())
        }
        async fn leave(&self) -> Result<(), FnsError> {
            Ok(())
        }
        async fn add_service(&self, _info: ServiceInfo) -> Result<(), FnsError> {
            Ok(())
        }
        fn node_events(&self) -> mpsc::Receiver<MembershipEvent> {
            self.events.lock().unwrap().take().unwrap()
        }
        fn shared(&self) -> Arc<dyn Shared> {
            Arc::new(NoopShared)
        }
    }

    fn manager() -> EndpointManager {
        EndpointManager::new(
            Arc::new(LocalTable::default()),
            Arc::new(NoopCluster::new()),
            Arc::new(NoopDialer),
            Arc::new(JsonCodec),
            b"secret".to_vec(),
            None,
        )
    }

    #[tokio::test]
    async fn local_round_trip_calls_the_local_service() {
        let manager = manager();
        manager.add(Arc::new(AddService { name: "math".into() })).await.unwrap();

        let result = manager
            .request(
                local_call_context(),
                "math",
                "add",
                serde_json::to_vec(&1i64).unwrap(),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let value: i64 = serde_json::from_slice(&result).unwrap();
        assert_eq!(value, 2);
    }

    struct RejectingDispatch;

    #[async_trait]
    impl Dispatch for RejectingDispatch {
        async fn run(
            &self,
            _task: fns_core::future::BoxFuture<'static, Result<Vec<u8>, FnsError>>,
        ) -> Result<Result<Vec<u8>, FnsError>, DispatchRejected> {
            Err(DispatchRejected)
        }
    }

    #[tokio::test]
    async fn pool_refusal_maps_to_too_many_requests() {
        let manager = manager().with_dispatch(Arc::new(RejectingDispatch));
        manager.add(Arc::new(AddService { name: "math".into() })).await.unwrap();

        let err = manager
            .request(
                local_call_context(),
                "math",
                "add",
                serde_json::to_vec(&1i64).unwrap(),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FnsError::TooManyRequests { .. }));
    }

    #[tokio::test]
    async fn unknown_service_is_not_found() {
        let manager = manager();
        let err = manager
            .request(
                local_call_context(),
                "ghost",
                "add",
                Vec::new(),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FnsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn public_fn_address_refuses_internal_services() {
        let manager = manager();
        manager
            .add(Arc::new(ServiceWithInternalFn))
            .await
            .unwrap();
        let err = manager
            .public_fn_address("secret-svc", "peek", &RequestOptions::default())
            .unwrap_err();
        assert!(matches!(err, FnsError::NotFound { .. }));
    }

    struct ServiceWithInternalFn;

    #[async_trait]
    impl LocalService for ServiceWithInternalFn {
        fn info(&self) -> ServiceInfo {
            ServiceInfo {
                name: "secret-svc".to_string(),
                internal: true,
                functions: vec![FnInfo {
                    name: "peek".to_string(),
                    readonly: true,
                    internal: false,
                }],
                document: None,
            }
        }

        async fn handle(
            &self,
            _ctx: CallContext,
            _fn_name: &str,
            _param: Vec<u8>,
        ) -> Result<Vec<u8>, FnsError> {
            Ok(Vec::new())
        }
    }
}
