//! Host-address retrievers (spec.md §4.2: "Host retrievers are
//! registered by name; `default` picks the first global-unicast IP from
//! the hostname; `env` reads the `FNS-HOST` environment variable").
//!
//! Modeled as a small process-wide registry rather than a hardcoded
//! match, matching spec.md §9's note that `hostRetrievers` is one of the
//! original's global mutable registries — here threaded explicitly
//! through a `HostRetrieverRegistry` value instead of living as a
//! process global.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use std::sync::Arc;

use crate::config::ConfigError;

/// Resolves the address this process should advertise to the cluster.
pub trait HostRetriever: Send + Sync {
    fn retrieve(&self) -> Result<String, ConfigError>;
}

fn is_global_unicast(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_global_unicast_v4(v4),
        IpAddr::V6(v6) => is_global_unicast_v6(v6),
    }
}

fn is_global_unicast_v4(ip: &Ipv4Addr) -> bool {
    !ip.is_loopback()
        && !ip.is_private()
        && !ip.is_link_local()
        && !ip.is_multicast()
        && !ip.is_broadcast()
        && !ip.is_unspecified()
        && !ip.is_documentation()
}

fn is_global_unicast_v6(ip: &Ipv6Addr) -> bool {
    !ip.is_loopback() && !ip.is_multicast() && !ip.is_unspecified()
}

/// `default`: resolves the local hostname via `gethostname`, then looks
/// it up via the system resolver and picks the first global-unicast
/// address, in resolution order.
pub struct DefaultHostRetriever;

impl HostRetriever for DefaultHostRetriever {
    fn retrieve(&self) -> Result<String, ConfigError> {
        let hostname = gethostname::gethostname()
            .into_string()
            .map_err(|_| ConfigError::InvalidEnvEncoding("hostname"))?;

        let candidates = (hostname.as_str(), 0u16)
            .to_socket_addrs()
            .map_err(|_| ConfigError::InvalidEnvValue("hostname", hostname.clone()))?;

        candidates
            .map(|addr| addr.ip())
            .find(is_global_unicast)
            .map(|ip| ip.to_string())
            .ok_or(ConfigError::InvalidEnvValue(
                "hostname",
                "no global-unicast address found".to_string(),
            ))
    }
}

/// `env`: reads `FNS-HOST` verbatim.
pub struct EnvHostRetriever;

const ENV_HOST_VAR: &str = "FNS-HOST";

impl HostRetriever for EnvHostRetriever {
    fn retrieve(&self) -> Result<String, ConfigError> {
        std::env::var(ENV_HOST_VAR).map_err(|err| match err {
            std::env::VarError::NotPresent => ConfigError::MissingField("FNS-HOST"),
            std::env::VarError::NotUnicode(_) => ConfigError::InvalidEnvEncoding("FNS-HOST"),
        })
    }
}

/// A by-name registry of host retrievers, pre-seeded with `default` and
/// `env`. Callers may register additional retrievers before resolving
/// `FnsConfig::host_retriever`.
pub struct HostRetrieverRegistry {
    retrievers: HashMap<String, Arc<dyn HostRetriever>>,
}

impl HostRetrieverRegistry {
    pub fn with_defaults() -> Self {
        let mut retrievers: HashMap<String, Arc<dyn HostRetriever>> = HashMap::new();
        retrievers.insert("default".to_string(), Arc::new(DefaultHostRetriever));
        retrievers.insert("env".to_string(), Arc::new(EnvHostRetriever));
        Self { retrievers }
    }

    pub fn register(&mut self, name: impl Into<String>, retriever: Arc<dyn HostRetriever>) {
        self.retrievers.insert(name.into(), retriever);
    }

    pub fn resolve(&self, name: &str) -> Result<String, ConfigError> {
        let retriever = self
            .retrievers
            .get(name)
            .ok_or(ConfigError::MissingField("host_retriever"))?;
        retriever.retrieve()
    }
}

impl Default for HostRetrieverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
