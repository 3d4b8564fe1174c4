//! Request options threaded through `Manager::Get`/`Request`, and the
//! reserved header names they are built from (spec.md §4.1 step 2, §4.3).

use std::collections::BTreeMap;

use semver::VersionReq;

/// Caller-supplied tie-break hints for endpoint resolution.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Force routing to a specific node id.
    pub id: Option<String>,
    /// Per-service-name semver constraints, e.g. `{"math": "[1.0.0,1.2.0)"}`.
    pub versions: BTreeMap<String, VersionReq>,
    pub device_id: Option<String>,
    pub device_ip: Option<String>,
    pub request_id: Option<String>,
    pub token: Option<String>,
    /// Set by the server side when rebuilding options from inbound headers,
    /// so the endpoint manager knows this call arrived over the wire.
    pub internal: bool,
    /// Cookies, `X-Forwarded-For`, `Origin`, and any `x-fns-user-*` header
    /// copied through transparently from an inbound request (spec.md §4.3
    /// "Copied through transparently"). Empty for a fresh local call.
    pub passthrough_headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_internal_request(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn version_for(&self, service: &str) -> Option<&VersionReq> {
        self.versions.get(service)
    }
}

/// Reserved wire header names (spec.md §4.3/§6). Kept as `&'static str`
/// constants rather than an enum so transport adapters can match them
/// case-insensitively without an extra parsing step.
pub mod headers {
    pub const CONTENT_TYPE: &str = "content-type";
    pub const SIGNATURE: &str = "signature";
    pub const ENDPOINT_ID: &str = "endpoint-id";
    pub const DEVICE_ID: &str = "device-id";
    pub const DEVICE_IP: &str = "device-ip";
    pub const REQUEST_ID: &str = "request-id";
    pub const REQUEST_VERSIONS: &str = "request-versions";
    pub const AUTHORIZATION: &str = "authorization";

    /// The fixed content-type marker identifying the internal protocol.
    pub const CONTENT_TYPE_VALUE: &str = "application/avro+fns";

    /// Prefix reserved for caller-defined passthrough headers.
    pub const USER_PREFIX: &str = "x-fns-user-";

    /// Headers that are always copied through untouched, in addition to
    /// any header starting with [`USER_PREFIX`].
    pub const PASSTHROUGH: &[&str] = &["cookie", "x-forwarded-for", "origin"];

    pub fn is_passthrough(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        PASSTHROUGH.contains(&lower.as_str()) || lower.starts_with(USER_PREFIX)
    }
}
