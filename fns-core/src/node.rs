//! Cluster data model: `Node`, `ServiceInfo`, `FnInfo` (spec.md §3).

use semver::Version;
use serde::{Deserialize, Serialize};

/// Identity of one process in the cluster. Immutable for the lifetime of a
/// membership event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub version: Version,
    pub address: String,
    pub services: Vec<ServiceInfo>,
}

/// Declaration a node advertises for one service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub internal: bool,
    pub functions: Vec<FnInfo>,
    /// Opaque OpenAPI/document blob; generation itself is out of scope.
    pub document: Option<String>,
}

impl ServiceInfo {
    /// Sorts `functions` by name, the order `Manager::Add` commits before
    /// handing a `ServiceInfo` to the cluster layer.
    pub fn with_sorted_functions(mut self) -> Self {
        self.functions.sort_by(|a, b| a.name.cmp(&b.name));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnInfo {
    pub name: String,
    pub readonly: bool,
    pub internal: bool,
}

impl ServiceInfo {
    /// A function is effectively internal if either the service or the
    /// function itself is internal.
    pub fn fn_is_internal(&self, fn_name: &str) -> Option<bool> {
        self.functions
            .iter()
            .find(|f| f.name == fn_name)
            .map(|f| self.internal || f.internal)
    }
}
