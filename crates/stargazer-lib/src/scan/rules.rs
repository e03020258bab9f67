//! Built-in scan rules
//!
//! Each rule reads through the shared client and hands the records to a pure
//! classification function, so the classification logic is testable without
//! a cluster.

use super::ScanRule;
use crate::cluster::{async_trait, ClusterClient, Scope};
use crate::error::ScanError;
use crate::models::{generate_issue_id, DeploymentRecord, EventRecord, Issue, PodRecord, Priority};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Only events younger than this are correlated
pub const EVENT_RECENCY_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Maximum length of an event-derived description, ellipsis included
pub const MAX_EVENT_DESCRIPTION: usize = 200;

/// Pods restarting more often than this are flagged
const RESTART_THRESHOLD: u32 = 5;

/// Heuristic rules report at most this many of the latest matches
const HEURISTIC_LIMIT: usize = 5;

const NETWORK_KEYWORDS: &[&str] = &["network", "policy", "forbidden", "denied", "cilium"];

/// The full built-in rule set
pub fn default_rules() -> Vec<Arc<dyn ScanRule>> {
    vec![
        Arc::new(PodRule),
        Arc::new(DeploymentRule),
        Arc::new(EventRule),
        Arc::new(ServiceMeshRule),
        Arc::new(NetworkPolicyRule),
        Arc::new(PolicyViolationRule),
    ]
}

/// Pod status, restarts, readiness and waiting containers
pub struct PodRule;

#[async_trait]
impl ScanRule for PodRule {
    fn name(&self) -> &'static str {
        "pods"
    }

    async fn scan(&self, client: &ClusterClient, scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        let pods = client.get_pods(scope).await;
        Ok(pods.iter().flat_map(pod_issues).collect())
    }
}

/// Replica mismatch and availability
pub struct DeploymentRule;

#[async_trait]
impl ScanRule for DeploymentRule {
    fn name(&self) -> &'static str {
        "deployments"
    }

    async fn scan(&self, client: &ClusterClient, scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        let deployments = client.get_deployments(scope).await;
        Ok(deployments.iter().flat_map(deployment_issues).collect())
    }
}

/// Recent warning events grouped per object and reason
pub struct EventRule;

#[async_trait]
impl ScanRule for EventRule {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn scan(&self, client: &ClusterClient, scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        let events = client.get_events(scope).await;
        Ok(correlate_events(&events, Utc::now()))
    }
}

/// Istio sidecar heuristic
pub struct ServiceMeshRule;

#[async_trait]
impl ScanRule for ServiceMeshRule {
    fn name(&self) -> &'static str {
        "service-mesh"
    }

    fn advisory(&self) -> bool {
        true
    }

    async fn scan(&self, client: &ClusterClient, scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        let pods = client.get_pods(scope).await;
        Ok(service_mesh_issues(&pods))
    }
}

/// NetworkPolicy / Cilium heuristic over event messages
pub struct NetworkPolicyRule;

#[async_trait]
impl ScanRule for NetworkPolicyRule {
    fn name(&self) -> &'static str {
        "network-policy"
    }

    fn advisory(&self) -> bool {
        true
    }

    async fn scan(&self, client: &ClusterClient, scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        let events = client.get_events(scope).await;
        Ok(network_policy_issues(&events))
    }
}

/// Kyverno-style policy violation heuristic over event messages
pub struct PolicyViolationRule;

#[async_trait]
impl ScanRule for PolicyViolationRule {
    fn name(&self) -> &'static str {
        "policy-violation"
    }

    fn advisory(&self) -> bool {
        true
    }

    async fn scan(&self, client: &ClusterClient, scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        let events = client.get_events(scope).await;
        Ok(policy_violation_issues(&events))
    }
}

fn pod_issue(
    pod: &PodRecord,
    issue_type: &str,
    priority: Priority,
    title: String,
    description: String,
) -> Issue {
    Issue::new(
        generate_issue_id(&pod.name, issue_type),
        title,
        description,
        priority,
        "pod",
        &pod.name,
        &pod.namespace,
    )
}

/// Issues for a single pod
pub fn pod_issues(pod: &PodRecord) -> Vec<Issue> {
    let mut issues = Vec::new();
    let (name, ns) = (&pod.name, &pod.namespace);

    if pod.status != "Running" && pod.status != "Succeeded" {
        let priority = match pod.status.as_str() {
            "Failed" | "CrashLoopBackOff" | "Error" => Priority::Critical,
            _ => Priority::Warning,
        };
        let hint = match pod.status.as_str() {
            "CrashLoopBackOff" | "Error" => format!(
                " Container is crashing. Check logs with: kubectl logs {} -n {} --previous",
                name, ns
            ),
            "Pending" => format!(
                " Pod cannot be scheduled. Check events with: kubectl get events -n {} --field-selector involvedObject.name={}",
                ns, name
            ),
            "Failed" => format!(
                " Pod has failed. Check describe output: kubectl describe pod {} -n {}",
                name, ns
            ),
            _ => String::new(),
        };

        issues.push(pod_issue(
            pod,
            "status",
            priority,
            format!("Pod {} in {} state", name, pod.status),
            format!("Pod is in {} state instead of Running.{}", pod.status, hint),
        ));
    }

    for waiting in &pod.waiting {
        let priority = match waiting.reason.as_str() {
            "CrashLoopBackOff" | "ImagePullBackOff" | "ErrImagePull" => Priority::Critical,
            _ => Priority::Warning,
        };
        issues.push(pod_issue(
            pod,
            &format!("container-{}", waiting.container),
            priority,
            format!(
                "Container {} in pod {}: {}",
                waiting.container, name, waiting.reason
            ),
            format!("Container is waiting: {}. {}", waiting.reason, waiting.message)
                .trim_end()
                .to_string(),
        ));
    }

    if pod.restarts > RESTART_THRESHOLD {
        issues.push(pod_issue(
            pod,
            "restarts",
            Priority::Warning,
            format!("High restart count for {}", name),
            format!(
                "Pod has restarted {} times. Check crash logs: kubectl logs {} -n {} --previous. Review events: kubectl get events -n {} --field-selector involvedObject.name={}",
                pod.restarts, name, ns, ns, name
            ),
        ));
    }

    if pod.status == "Running" && !pod.ready {
        issues.push(pod_issue(
            pod,
            "readiness",
            Priority::Warning,
            format!("Pod {} not ready", name),
            format!(
                "Pod is running but readiness probe is failing. Check logs and probe configuration. Run: kubectl describe pod {} -n {} to see probe details.",
                name, ns
            ),
        ));
    }

    issues
}

/// Issues for a single deployment
pub fn deployment_issues(deployment: &DeploymentRecord) -> Vec<Issue> {
    let mut issues = Vec::new();
    let issue = |issue_type: &str, priority, title: String, description: String| {
        Issue::new(
            generate_issue_id(&deployment.name, issue_type),
            title,
            description,
            priority,
            "deployment",
            &deployment.name,
            &deployment.namespace,
        )
    };

    if deployment.replicas != deployment.ready {
        issues.push(issue(
            "replicas",
            Priority::Warning,
            format!("Replica mismatch in {}", deployment.name),
            format!(
                "Expected {} replicas, {} ready",
                deployment.replicas, deployment.ready
            ),
        ));
    }

    if deployment.available < deployment.replicas {
        issues.push(issue(
            "availability",
            Priority::Critical,
            format!("Deployment {} unavailable", deployment.name),
            format!(
                "Only {} of {} replicas available",
                deployment.available, deployment.replicas
            ),
        ));
    }

    issues
}

fn is_recent(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match timestamp {
        Some(ts) => (now - ts).num_seconds() < EVENT_RECENCY_WINDOW.as_secs() as i64,
        None => false,
    }
}

fn truncate_description(message: &str) -> String {
    if message.chars().count() <= MAX_EVENT_DESCRIPTION {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_EVENT_DESCRIPTION - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Group events by (kind, name, reason) and emit one issue per group for the
/// most recent event inside the recency window
pub fn correlate_events(events: &[EventRecord], now: DateTime<Utc>) -> Vec<Issue> {
    let mut latest: HashMap<(&str, &str, &str), &EventRecord> = HashMap::new();

    for event in events.iter().filter(|e| is_recent(e.timestamp, now)) {
        let key = (
            event.object_kind.as_str(),
            event.object_name.as_str(),
            event.reason.as_str(),
        );
        latest
            .entry(key)
            .and_modify(|current| {
                if event.timestamp > current.timestamp {
                    *current = event;
                }
            })
            .or_insert(event);
    }

    latest
        .into_values()
        .map(|event| {
            let priority = if event.reason.contains("Error") || event.reason.contains("Failed") {
                Priority::Critical
            } else if event.event_type == "Warning" {
                Priority::Warning
            } else {
                Priority::Info
            };

            Issue::new(
                generate_issue_id(&event.object_name, &format!("event-{}", event.reason)),
                format!(
                    "{} on {}/{}",
                    event.reason, event.object_kind, event.object_name
                ),
                truncate_description(&event.message),
                priority,
                event.object_kind.to_lowercase(),
                &event.object_name,
                &event.namespace,
            )
        })
        .collect()
}

fn has_istio_markers(pod: &PodRecord) -> bool {
    pod.labels.iter().any(|(key, value)| {
        key.contains("istio-injection")
            || value.contains("istio-injection")
            || key.to_lowercase().contains("istio")
    })
}

/// Pods carrying Istio markers that are running but not ready
pub fn service_mesh_issues(pods: &[PodRecord]) -> Vec<Issue> {
    pods.iter()
        .filter(|p| has_istio_markers(p) && p.status == "Running" && !p.ready)
        .map(|pod| {
            pod_issue(
                pod,
                "istio-sidecar",
                Priority::Warning,
                format!("Istio sidecar issue in {}", pod.name),
                format!(
                    "Pod appears to have Istio injection but may have sidecar issues. Check: kubectl logs {} -n {} -c istio-proxy",
                    pod.name, pod.namespace
                ),
            )
        })
        .collect()
}

fn event_kind_or_pod(event: &EventRecord) -> String {
    if event.object_kind.is_empty() {
        "pod".to_string()
    } else {
        event.object_kind.to_lowercase()
    }
}

fn last_n<'a>(matches: Vec<&'a EventRecord>, n: usize) -> impl Iterator<Item = &'a EventRecord> {
    let skip = matches.len().saturating_sub(n);
    matches.into_iter().skip(skip)
}

/// Events whose message hints at network policy denials
pub fn network_policy_issues(events: &[EventRecord]) -> Vec<Issue> {
    let matches: Vec<&EventRecord> = events
        .iter()
        .filter(|e| {
            let message = e.message.to_lowercase();
            NETWORK_KEYWORDS.iter().any(|k| message.contains(k))
        })
        .collect();

    last_n(matches, HEURISTIC_LIMIT)
        .filter(|e| {
            let message = e.message.to_lowercase();
            message.contains("network") || message.contains("policy")
        })
        .map(|event| {
            Issue::new(
                generate_issue_id(&event.object_name, "network-policy"),
                format!("Network policy issue: {}", event.reason),
                format!(
                    "{}. Check network policies: kubectl get networkpolicies -n {}. For Cilium: kubectl get cnp,ccnp -A",
                    event.message, event.namespace
                ),
                Priority::Warning,
                event_kind_or_pod(event),
                &event.object_name,
                &event.namespace,
            )
        })
        .collect()
}

/// Events that look like admission policy violations
pub fn policy_violation_issues(events: &[EventRecord]) -> Vec<Issue> {
    let matches: Vec<&EventRecord> = events
        .iter()
        .filter(|e| {
            let message = e.message.to_lowercase();
            message.contains("kyverno")
                || (e.reason.to_lowercase().contains("policy") && message.contains("violation"))
        })
        .collect();

    last_n(matches, HEURISTIC_LIMIT)
        .map(|event| {
            Issue::new(
                generate_issue_id(&event.object_name, "policy-violation"),
                format!("Policy violation: {}", event.reason),
                format!(
                    "{}. Check Kyverno policies: kubectl get policyreport -n {}",
                    event.message, event.namespace
                ),
                Priority::Warning,
                event_kind_or_pod(event),
                &event.object_name,
                &event.namespace,
            )
        })
        .collect()
}
