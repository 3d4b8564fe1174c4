//! The demo `math.add` service and the in-process `LocalEndpoints` table
//! it registers into, per SPEC_FULL.md §10's "starts one example local
//! service (`math.add`)".
//!
//! `LocalTable` mirrors `fns-manager::manager`'s own test double of the
//! same shape (a `Mutex<Vec<Arc<dyn LocalService>>>`) — that table is
//! private to `fns-manager`'s test module, so `fns-cli` needs its own
//! instance of the same small adapter to actually run a process.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fns_core::{CallContext, FnInfo, FnsError, LocalEndpoints, LocalService, ServiceInfo};
use serde::{Deserialize, Serialize};

pub struct LocalTable {
    services: Mutex<Vec<Arc<dyn LocalService>>>,
}

impl LocalTable {
    pub fn new() -> Self {
        Self {
            services: Mutex::new(Vec::new()),
        }
    }
}

impl Default for LocalTable {
    fn default() -> Self {
        Self::new()
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

#[derive(Deserialize)]
struct AddParams {
    a: i64,
    b: i64,
}

#[derive(Serialize)]
struct AddResult {
    sum: i64,
}

/// A trivial, stateless arithmetic service — enough surface to prove a
/// `Request` round-trips through the manager, not a real workload.
pub struct MathService;

#[async_trait]
impl LocalService for MathService {
    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: "math".to_string(),
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
        match fn_name {
            "add" => {
                let params: AddParams =
                    serde_json::from_slice(&param).map_err(|e| FnsError::InvalidBody {
                        reason: format!("math.add expects {{\"a\":.., \"b\":..}}: {e}"),
                    })?;
                serde_json::to_vec(&AddResult {
                    sum: params.a + params.b,
                })
                .map_err(|e| FnsError::InvalidBody {
                    reason: format!("failed to encode math.add result: {e}"),
                })
            }
            other => Err(FnsError::not_found("math", other)),
        }
    }
}
