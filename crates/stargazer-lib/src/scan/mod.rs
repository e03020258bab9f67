//! Issue discovery over cluster state
//!
//! The `Scanner` launches every `ScanRule` as its own task against one shared
//! `ClusterClient` and joins on all of them. A failed rule becomes a
//! `RuleFailure` value in the report; it never aborts the other rules.
//! The aggregate issue list is unordered and not deduplicated.

mod rules;
mod scheduler;

#[cfg(test)]
mod tests;

pub use rules::{
    correlate_events, default_rules, deployment_issues, network_policy_issues, pod_issues,
    policy_violation_issues, service_mesh_issues, DeploymentRule, EventRule, NetworkPolicyRule,
    PodRule, PolicyViolationRule, ServiceMeshRule, EVENT_RECENCY_WINDOW, MAX_EVENT_DESCRIPTION,
};
pub use scheduler::{ScanLoop, ScanLoopBuilder, ScanLoopConfig};

use crate::cluster::{async_trait, ClusterClient, ReadFailure, ResourceKind, Scope};
use crate::error::ScanError;
use crate::models::{DeploymentRecord, EventRecord, Issue, PodRecord};
use crate::observability::{instance_name, ScannerMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// One independent issue detector
#[async_trait]
pub trait ScanRule: Send + Sync {
    /// Stable rule name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Advisory rules are best-effort heuristics; their failures are logged quietly
    fn advisory(&self) -> bool {
        false
    }

    async fn scan(&self, client: &ClusterClient, scope: &Scope) -> Result<Vec<Issue>, ScanError>;
}

/// A rule that contributed no issues because it failed
#[derive(Debug)]
pub struct RuleFailure {
    pub rule: &'static str,
    pub advisory: bool,
    pub error: ScanError,
}

/// Aggregate result of one scan
#[derive(Debug)]
pub struct ScanReport {
    pub scope: Scope,
    pub issues: Vec<Issue>,
    pub failures: Vec<RuleFailure>,
    /// Resource kinds the control plane failed to serve during this scan
    pub read_failures: Vec<ReadFailure>,
    pub elapsed: Duration,
}

impl ScanReport {
    /// No resource kind could be read, so an empty issue list means nothing
    pub fn cluster_unreachable(&self) -> bool {
        self.read_failures.len() >= ResourceKind::ALL.len()
    }
}

/// Concurrent fan-out/fan-in over scan rules
pub struct Scanner {
    client: Arc<ClusterClient>,
    rules: Vec<Arc<dyn ScanRule>>,
    metrics: ScannerMetrics,
    logger: StructuredLogger,
}

impl Scanner {
    /// Scanner with the built-in rule set
    pub fn new(client: Arc<ClusterClient>) -> Self {
        Self::with_rules(client, default_rules())
    }

    pub fn with_rules(client: Arc<ClusterClient>, rules: Vec<Arc<dyn ScanRule>>) -> Self {
        Self {
            client,
            rules,
            metrics: ScannerMetrics::new(),
            logger: StructuredLogger::new(instance_name()),
        }
    }

    pub fn client(&self) -> &Arc<ClusterClient> {
        &self.client
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Every issue currently detected in `scope`, in no particular order
    pub async fn scan_all(&self, scope: &Scope) -> Vec<Issue> {
        self.scan_report(scope).await.issues
    }

    /// Run all rules concurrently and wait for every one of them
    pub async fn scan_report(&self, scope: &Scope) -> ScanReport {
        let started = Instant::now();

        let handles: Vec<_> = self
            .rules
            .iter()
            .map(|rule| {
                let rule = Arc::clone(rule);
                let client = Arc::clone(&self.client);
                let scope = scope.clone();
                let meta = (rule.name(), rule.advisory());
                let handle = tokio::spawn(async move { rule.scan(&client, &scope).await });
                (meta, handle)
            })
            .collect();

        let mut issues = Vec::new();
        let mut failures = Vec::new();

        for ((rule, advisory), handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(ScanError::Aborted(join_error.to_string())),
            };

            match outcome {
                Ok(found) => {
                    debug!(rule = rule, count = found.len(), "Scan rule complete");
                    issues.extend(found);
                }
                Err(error) => {
                    self.logger.log_rule_failure(rule, &error.to_string(), advisory);
                    self.metrics.inc_rule_failures(rule);
                    failures.push(RuleFailure {
                        rule,
                        advisory,
                        error,
                    });
                }
            }
        }

        ScanReport {
            scope: scope.clone(),
            issues,
            failures,
            read_failures: self.client.failed_reads(),
            elapsed: started.elapsed(),
        }
    }

    /// Aggregate health counters, read independently of the issue scan
    pub async fn get_resource_health(&self, scope: &Scope) -> ResourceHealth {
        let (pods, deployments, events) = tokio::join!(
            self.client.get_pods(scope),
            self.client.get_deployments(scope),
            self.client.get_events(scope),
        );
        ResourceHealth::summarize(&pods, &deployments, &events)
    }
}

/// Total and healthy counts for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTally {
    pub total: usize,
    pub healthy: usize,
}

impl HealthTally {
    pub fn unhealthy(&self) -> usize {
        self.total.saturating_sub(self.healthy)
    }
}

/// Counts of non-Normal events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTally {
    pub warnings: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
}

impl OverallHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallHealth::Healthy => "healthy",
            OverallHealth::Degraded => "degraded",
        }
    }
}

/// Cluster health summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHealth {
    pub pods: HealthTally,
    pub deployments: HealthTally,
    pub events: EventTally,
    pub overall_health: OverallHealth,
}

impl ResourceHealth {
    pub fn summarize(
        pods: &[PodRecord],
        deployments: &[DeploymentRecord],
        events: &[EventRecord],
    ) -> Self {
        let pods = HealthTally {
            total: pods.len(),
            healthy: pods.iter().filter(|p| p.is_healthy()).count(),
        };
        let deployments = HealthTally {
            total: deployments.len(),
            healthy: deployments.iter().filter(|d| d.is_healthy()).count(),
        };
        let events = EventTally {
            warnings: events.iter().filter(|e| e.is_warning()).count(),
            errors: events.iter().filter(|e| e.is_error()).count(),
        };

        let overall_health = if pods.healthy == pods.total
            && deployments.healthy == deployments.total
            && pods.total > 0
        {
            OverallHealth::Healthy
        } else {
            OverallHealth::Degraded
        };

        Self {
            pods,
            deployments,
            events,
            overall_health,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_health == OverallHealth::Healthy
    }
}
