//! Health-state observability (SPEC_FULL.md §10), supplementing spec.md
//! §3's bare `isHealth`/`running` booleans with a per-service rollup,
//! following `spark_otel::health`'s `HealthCheckProvider` shape — adapted
//! here to report counts rather than re-export a probe trait, since
//! `fns-core` carries no observability contract of its own.

use fns_manager::{EndpointState, Registrations};

/// Endpoint-state tally for one service name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentHealth {
    pub service: String,
    pub pending: usize,
    pub active: usize,
    pub degraded: usize,
    pub shutdown: usize,
}

impl ComponentHealth {
    fn record(&mut self, state: EndpointState) {
        match state {
            EndpointState::Pending => self.pending += 1,
            EndpointState::Active => self.active += 1,
            EndpointState::Degraded => self.degraded += 1,
            EndpointState::Shutdown => self.shutdown += 1,
        }
    }
}

/// A point-in-time report across every registered remote service.
#[derive(Clone, Debug, Default)]
pub struct HealthSnapshot {
    pub components: Vec<ComponentHealth>,
}

impl HealthSnapshot {
    /// Walks `registrations` and tallies each endpoint's current state,
    /// one `ComponentHealth` per service name, sorted for deterministic
    /// reporting.
    pub fn capture(registrations: &Registrations) -> Self {
        let snapshot = registrations.snapshot();
        let mut components: Vec<ComponentHealth> = snapshot
            .iter()
            .map(|(name, table)| {
                let mut component = ComponentHealth {
                    service: name.clone(),
                    ..Default::default()
                };
                for endpoint in table.iter_endpoints() {
                    component.record(endpoint.state());
                }
                component
            })
            .collect();
        components.sort_by(|a, b| a.service.cmp(&b.service));
        Self { components }
    }

    /// `true` once any component has at least one degraded endpoint and
    /// none active — a coarse process-level liveness signal for a
    /// readiness probe to key off of.
    pub fn has_fully_degraded_component(&self) -> bool {
        self.components
            .iter()
            .any(|c| c.active == 0 && c.degraded > 0)
    }
}
