//! `fns`: a thin bootstrap binary wiring config, hosting, and a loopback
//! cluster, for running the hard core end to end without a production
//! transport/gossip stack (SPEC_FULL.md §10 "CLI bootstrap"; explicitly
//! not a production server per spec.md §1 non-goals).

mod barrier;
mod loopback;
mod service;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fns_core::{FnsError, RequestOptions};
use fns_hosting::{
    ConfigBuilder, GracefulShutdownCoordinator, HostRetrieverRegistry, ShutdownTarget,
};
use fns_manager::{local_call_context, EndpointManager};
use fns_otel::HealthSnapshot;
use fns_rpc::{InternalHandler, JsonCodec};
use fns_store::{LocalLockers, LocalStore};
use barrier::{barrier_config, Barrier};
use loopback::{LoopbackCluster, LoopbackRegistry};
use service::{LocalTable, MathService};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fns", about = "FNS clustered function runtime demo host")]
struct Cli {
    /// Path to a TOML config file (overlaid with FNS_* environment
    /// variables; see fns-hosting::config).
    #[arg(long, default_value = "fns.toml")]
    config: String,

    /// The address this node advertises to itself for the loopback demo
    /// call.
    #[arg(long, default_value = "loopback-self")]
    self_address: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = fns_otel::install() {
        eprintln!("tracing already installed: {err}");
    }

    let cli = Cli::parse();

    let config = ConfigBuilder::new()
        .with_file_and_env(&cli.config)
        .resolve()?;
    info!(cluster = %config.cluster_name, "loaded configuration");

    let host_retrievers = HostRetrieverRegistry::with_defaults();
    let advertised_host = host_retrievers
        .resolve(&config.host_retriever)
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "host retriever failed, falling back to self_address flag");
            cli.self_address.clone()
        });
    info!(host = %advertised_host, "resolved advertised host");

    let store = Arc::new(LocalStore::new());
    let lockers = Arc::new(LocalLockers::new());
    let barrier = Barrier::new(
        barrier_config(&config.barrier),
        Arc::clone(&store) as Arc<dyn fns_core::Store>,
        Arc::clone(&lockers) as Arc<dyn fns_core::Lockers>,
    );

    let registry = LoopbackRegistry::new();
    let cluster = Arc::new(LoopbackCluster::new(store.clone(), lockers.clone()));
    let local = Arc::new(LocalTable::new());

    let manager = Arc::new(EndpointManager::new(
        local,
        cluster,
        Arc::new(registry.clone()),
        Arc::new(JsonCodec),
        config.secret.clone(),
        Some(cli.self_address.clone()),
    ));

    let handler = Arc::new(InternalHandler::new(
        config.secret.clone(),
        JsonCodec,
        manager.clone(),
    ));
    registry.register(cli.self_address.clone(), handler);

    manager.add(Arc::new(MathService)).await?;
    manager.listen().await?;

    // Route the demo call through the configured barrier so concurrent
    // callers for the same key would coalesce onto one execution.
    let manager_for_call = manager.clone();
    let result = barrier
        .do_call("math.add(2,3)", move || {
            let manager = manager_for_call.clone();
            async move {
                let options = RequestOptions::default();
                let param = serde_json::to_vec(&serde_json::json!({"a": 2, "b": 3}))
                    .map_err(|e| FnsError::InvalidBody {
                        reason: e.to_string(),
                    })?;
                manager
                    .request(local_call_context(), "math", "add", param, options)
                    .await
            }
        })
        .await?;
    let decoded: serde_json::Value = serde_json::from_slice(&result)?;
    info!(result = %decoded, "math.add call succeeded");
    println!("math.add(2, 3) = {decoded}");

    let health = HealthSnapshot::capture(manager.registrations());
    info!(components = health.components.len(), "health snapshot captured");

    let mut coordinator = GracefulShutdownCoordinator::new();
    let manager_for_shutdown = manager.clone();
    coordinator.register(ShutdownTarget::new("endpoint-manager", async move {
        manager_for_shutdown.shutdown().await
    }));
    coordinator.register(ShutdownTarget::new("store-and-locker", async move {
        drop(store);
        drop(lockers);
        Ok::<(), FnsError>(())
    }));

    let report = coordinator.shutdown(Duration::from_secs(5)).await;
    if !report.all_completed() {
        tracing::warn!("graceful shutdown did not complete all targets cleanly");
    }

    Ok(())
}
