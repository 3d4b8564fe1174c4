//! Local service/function contracts. The "local collaborator" the
//! endpoint manager composes with the cluster registration table
//! implements [`LocalEndpoints`]; each registered service implements
//! [`LocalService`].

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::FnsError;
use crate::node::ServiceInfo;

/// One function call dispatched to a locally-hosted service.
#[async_trait]
pub trait LocalService: Send + Sync + 'static {
    fn info(&self) -> ServiceInfo;

    async fn handle(
        &self,
        ctx: CallContext,
        fn_name: &str,
        param: Vec<u8>,
    ) -> Result<Vec<u8>, FnsError>;
}

/// The local half of the endpoint manager: owns locally-hosted services,
/// independent of anything cluster/remote. `Manager::Add`/`Info`/`Get`
/// consult this before ever looking at the remote registration table.
#[async_trait]
pub trait LocalEndpoints: Send + Sync + 'static {
    fn add(&self, service: std::sync::Arc<dyn LocalService>) -> Result<(), FnsError>;

    fn get(&self, name: &str) -> Option<std::sync::Arc<dyn LocalService>>;

    fn info(&self) -> Vec<ServiceInfo>;

    async fn listen(&self) -> Result<(), FnsError>;

    async fn shutdown(&self) -> Result<(), FnsError>;
}
