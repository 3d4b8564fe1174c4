//! Picks the singleflight barrier the host actually runs, driven by
//! `FnsConfig.barrier` (spec.md §4.2, §4.4): `standalone` selects the
//! pure in-process `Group`, otherwise a `ClusterBarrier` guarded by the
//! shared store and locker.

use std::future::Future;
use std::sync::Arc;

use fns_barrier::{BarrierConfig, ClusterBarrier, Group};
use fns_core::{FnsError, Lockers, Store};
use fns_hosting::BarrierSettings;

pub fn barrier_config(settings: &BarrierSettings) -> BarrierConfig {
    BarrierConfig {
        ttl: settings.ttl,
        interval: settings.interval,
        standalone: settings.standalone,
    }
}

/// Either singleflight mode behind one call surface, so `fns-cli`'s demo
/// call site doesn't need to match on which mode was configured.
pub enum Barrier {
    Standalone(Group),
    Cluster(ClusterBarrier),
}

impl Barrier {
    pub fn new(config: BarrierConfig, store: Arc<dyn Store>, lockers: Arc<dyn Lockers>) -> Self {
        if config.standalone {
            Barrier::Standalone(Group::new())
        } else {
            Barrier::Cluster(ClusterBarrier::new(store, lockers, config))
        }
    }

    pub async fn do_call<F, Fut>(&self, key: &str, producer: F) -> Result<Vec<u8>, FnsError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, FnsError>> + Send + 'static,
    {
        match self {
            Barrier::Standalone(group) => group.do_call(key, producer).await,
            Barrier::Cluster(cluster) => cluster.call(key, producer).await,
        }
    }
}
