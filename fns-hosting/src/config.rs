//! Layered configuration loading for the FNS cluster config (spec.md
//! §4.2: "The cluster config carries `{secret, hostRetriever, barrier:
//! {ttl, interval, standalone}, name, option}`").
//!
//! Mirrors `spark-core::configuration`'s `ConfigurationSource` →
//! `ConfigurationBuilder` → `ResolvedConfiguration` layering model,
//! trimmed to the one layer pair FNS actually needs: a TOML file and an
//! environment overlay, applied in the order registered, last write
//! wins. There is no hot-reload watch — `spark-core`'s `watch`/`ConfigDelta`
//! machinery has no FNS consumer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment variable {0} is not valid UTF-8")]
    InvalidEnvEncoding(&'static str),
    #[error("environment variable {0} could not be parsed: {1}")]
    InvalidEnvValue(&'static str, String),
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
}

/// Resolved barrier tuning (spec.md §4.2, §6): TTL for a decided barrier
/// entry, the poll interval waiters use, and whether the barrier runs
/// standalone (in-process only) or cluster-wide (locker-guarded). Mirrors
/// `fns_barrier::BarrierConfig` field-for-field (a host assembles the
/// latter from this via a plain struct literal, see `fns-cli`'s barrier
/// wiring) and matches its defaults (spec.md §4.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BarrierSettings {
    pub ttl: Duration,
    pub interval: Duration,
    pub standalone: bool,
}

impl Default for BarrierSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            interval: Duration::from_millis(100),
            standalone: false,
        }
    }
}

/// The fully resolved cluster configuration an `EndpointManager` and its
/// collaborators are built from.
#[derive(Clone, Debug)]
pub struct FnsConfig {
    pub secret: Vec<u8>,
    pub host_retriever: String,
    pub barrier: BarrierSettings,
    pub cluster_name: String,
}

/// Partial config a single layer contributes. Every field is optional so
/// a layer may supply only what it knows about; later layers overwrite
/// earlier ones field-by-field.
#[derive(Clone, Debug, Default, Deserialize)]
struct RawConfig {
    secret: Option<String>,
    host_retriever: Option<String>,
    cluster_name: Option<String>,
    barrier: Option<RawBarrier>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawBarrier {
    ttl_secs: Option<u64>,
    interval_ms: Option<u64>,
    standalone: Option<bool>,
}

impl RawConfig {
    fn merge(&mut self, other: RawConfig) {
        if other.secret.is_some() {
            self.secret = other.secret;
        }
        if other.host_retriever.is_some() {
            self.host_retriever = other.host_retriever;
        }
        if other.cluster_name.is_some() {
            self.cluster_name = other.cluster_name;
        }
        match (&mut self.barrier, other.barrier) {
            (Some(current), Some(incoming)) => {
                if incoming.ttl_secs.is_some() {
                    current.ttl_secs = incoming.ttl_secs;
                }
                if incoming.interval_ms.is_some() {
                    current.interval_ms = incoming.interval_ms;
                }
                if incoming.standalone.is_some() {
                    current.standalone = incoming.standalone;
                }
            }
            (current @ None, Some(incoming)) => *current = Some(incoming),
            (_, None) => {}
        }
    }

    fn resolve(self) -> Result<FnsConfig, ConfigError> {
        let secret = self.secret.ok_or(ConfigError::MissingField("secret"))?;
        let cluster_name = self
            .cluster_name
            .ok_or(ConfigError::MissingField("cluster_name"))?;
        let host_retriever = self.host_retriever.unwrap_or_else(|| "default".to_string());
        let raw_barrier = self.barrier.unwrap_or_default();
        let defaults = BarrierSettings::default();
        let barrier = BarrierSettings {
            ttl: raw_barrier
                .ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            interval: raw_barrier
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            standalone: raw_barrier.standalone.unwrap_or(defaults.standalone),
        };

        Ok(FnsConfig {
            secret: secret.into_bytes(),
            host_retriever,
            barrier,
            cluster_name,
        })
    }
}

/// One source of configuration fields. Grounded on
/// `spark-core::configuration::ConfigurationSource::load`, object-safe
/// here since FNS never needs the generic associated `Stream` type (no
/// watch support).
pub trait ConfigLayer: Send + Sync {
    fn load(&self) -> Result<RawConfig, ConfigError>;
}

/// Loads a TOML file from disk. A missing file is an error, not a silent
/// empty layer — callers that want an optional file should check
/// existence before registering this layer.
pub struct FileLayer {
    path: PathBuf,
}

impl FileLayer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigLayer for FileLayer {
    fn load(&self) -> Result<RawConfig, ConfigError> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Reads `FNS_SECRET`, `FNS_HOST_RETRIEVER`, `FNS_CLUSTER_NAME`,
/// `FNS_BARRIER_TTL_SECS`, `FNS_BARRIER_INTERVAL_MS`,
/// `FNS_BARRIER_STANDALONE` as an overlay, intended to be registered
/// after a [`FileLayer`] so environment values win.
pub struct EnvLayer;

impl EnvLayer {
    fn read_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
        match std::env::var(name) {
            Ok(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnvValue(name, value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvEncoding(name)),
        }
    }

    fn read_bool(name: &'static str) -> Result<Option<bool>, ConfigError> {
        match std::env::var(name) {
            Ok(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnvValue(name, value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvEncoding(name)),
        }
    }

    fn read_string(name: &'static str) -> Result<Option<String>, ConfigError> {
        match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvEncoding(name)),
        }
    }
}

impl ConfigLayer for EnvLayer {
    fn load(&self) -> Result<RawConfig, ConfigError> {
        let ttl_secs = Self::read_u64("FNS_BARRIER_TTL_SECS")?;
        let interval_ms = Self::read_u64("FNS_BARRIER_INTERVAL_MS")?;
        let standalone = Self::read_bool("FNS_BARRIER_STANDALONE")?;
        let barrier = if ttl_secs.is_some() || interval_ms.is_some() || standalone.is_some() {
            Some(RawBarrier {
                ttl_secs,
                interval_ms,
                standalone,
            })
        } else {
            None
        };

        Ok(RawConfig {
            secret: Self::read_string("FNS_SECRET")?,
            host_retriever: Self::read_string("FNS_HOST_RETRIEVER")?,
            cluster_name: Self::read_string("FNS_CLUSTER_NAME")?,
            barrier,
        })
    }
}

/// Merges a sequence of [`ConfigLayer`]s, in registration order, into a
/// [`FnsConfig`]. Mirrors `spark-core::configuration`'s
/// `ConfigurationBuilder`, minus priority re-sorting: FNS callers
/// register layers in the order they should apply (lowest priority
/// first).
#[derive(Default)]
pub struct ConfigBuilder {
    layers: Vec<Box<dyn ConfigLayer>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: impl ConfigLayer + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Convenience for the common case: a TOML file, overlaid with
    /// environment variables.
    pub fn with_file_and_env(self, path: impl AsRef<Path>) -> Self {
        self.with_layer(FileLayer::new(path.as_ref().to_path_buf()))
            .with_layer(EnvLayer)
    }

    pub fn resolve(self) -> Result<FnsConfig, ConfigError> {
        let mut merged = RawConfig::default();
        for layer in &self.layers {
            merged.merge(layer.load()?);
        }
        merged.resolve()
    }
}
