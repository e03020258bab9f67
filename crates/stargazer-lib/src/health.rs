//! Daemon component health
//!
//! Component status is derived from what the last scan cycle observed:
//! control-plane reads for `cluster_client`, rule outcomes for `scanner`
//! and issue persistence for `storage`. `/healthz` reports the worst
//! component; `/readyz` also waits for the first completed cycle.

use crate::cluster::{ReadFailure, ResourceKind};
use crate::scan::RuleFailure;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Parts of the daemon that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    ClusterClient,
    Scanner,
    Storage,
}

impl Component {
    pub const ALL: [Component; 3] = [
        Component::ClusterClient,
        Component::Scanner,
        Component::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::ClusterClient => "cluster_client",
            Component::Scanner => "scanner",
            Component::Storage => "storage",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, with reduced coverage
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    /// Control-plane health from the kinds whose latest live read failed.
    ///
    /// Every kind failing means scans see an empty cluster, which is
    /// unhealthy rather than clean.
    pub fn from_reads(failures: &[ReadFailure]) -> Self {
        if failures.is_empty() {
            return Self::healthy();
        }
        let detail = join(failures.iter().map(|f| f.to_string()));
        if failures.len() >= ResourceKind::ALL.len() {
            Self::new(
                ComponentStatus::Unhealthy,
                Some(format!("control plane unreachable: {}", detail)),
            )
        } else {
            Self::new(
                ComponentStatus::Degraded,
                Some(format!("reads failing: {}", detail)),
            )
        }
    }

    /// Scanner health from failed rules. Advisory rules never degrade it.
    pub fn from_rules(failures: &[RuleFailure]) -> Self {
        let failed: Vec<&str> = failures
            .iter()
            .filter(|f| !f.advisory)
            .map(|f| f.rule)
            .collect();
        if failed.is_empty() {
            Self::healthy()
        } else {
            Self::new(
                ComponentStatus::Degraded,
                Some(format!("scan rules failed: {}", failed.join(", "))),
            )
        }
    }

    /// Storage health from the outcome of the last append
    pub fn from_store_error(error: Option<&str>) -> Self {
        match error {
            None => Self::healthy(),
            Some(e) => Self::new(
                ComponentStatus::Degraded,
                Some(format!("issues not persisted: {}", e)),
            ),
        }
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join("; ")
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

impl HealthResponse {
    /// Worst component status, `Healthy` when there are none
    pub fn compute_status(components: &BTreeMap<Component, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug)]
struct RegistryState {
    components: BTreeMap<Component, ComponentHealth>,
    cycle_completed: bool,
    shutting_down: bool,
}

/// Shared component health, updated once per scan cycle
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    /// Every component starts healthy; readiness waits for a first cycle
    pub fn new() -> Self {
        let components = Component::ALL
            .iter()
            .map(|c| (*c, ComponentHealth::healthy()))
            .collect();
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                components,
                cycle_completed: false,
                shutting_down: false,
            })),
        }
    }

    pub async fn update(&self, component: Component, health: ComponentHealth) {
        self.state.write().await.components.insert(component, health);
    }

    pub async fn observe_reads(&self, failures: &[ReadFailure]) {
        self.update(Component::ClusterClient, ComponentHealth::from_reads(failures))
            .await;
    }

    pub async fn observe_rules(&self, failures: &[RuleFailure]) {
        self.update(Component::Scanner, ComponentHealth::from_rules(failures))
            .await;
    }

    pub async fn observe_storage(&self, error: Option<&str>) {
        self.update(Component::Storage, ComponentHealth::from_store_error(error))
            .await;
    }

    /// A scan cycle has been fully processed
    pub async fn complete_cycle(&self) {
        self.state.write().await.cycle_completed = true;
    }

    /// Stop reporting ready; health stays as last observed
    pub async fn begin_shutdown(&self) {
        self.state.write().await.shutting_down = true;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let reason = if state.shutting_down {
            Some("Shutting down".to_string())
        } else if !state.cycle_completed {
            Some("First scan not yet complete".to_string())
        } else {
            state
                .components
                .iter()
                .find(|(_, h)| !h.status.is_operational())
                .map(|(c, h)| match &h.message {
                    Some(message) => format!("{} unhealthy: {}", c, message),
                    None => format!("{} unhealthy", c),
                })
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
