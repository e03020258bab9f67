//! Command handlers for each agent

use super::AgentContext;
use crate::advisor;
use crate::models::{Issue, Priority};
use crate::scan::{network_policy_issues, pod_issues, policy_violation_issues};

const DEFAULT_LOG_LINES: i64 = 50;
const ERROR_SCAN_LINES: i64 = 100;
const MAX_ERROR_LINES: usize = 10;
const LIST_LIMIT: usize = 10;
const EVENT_MESSAGE_PREVIEW: usize = 100;

const ERROR_KEYWORDS: &[&str] = &["error", "exception", "failed", "panic"];
const PRESSURE_REASONS: &[&str] = &["Evicted", "OOMKilling", "SystemOOM", "EvictionThresholdMet"];

const TOP_HINT: &str =
    "Resource usage analysis requires the metrics server. Use `kubectl top pods` for current usage.";

const CONNECTIVITY_HINT: &str =
    "Network connectivity checks require additional tooling. Consider a debugging pod such as netshoot.";

const IMAGE_SCAN_HINT: &str =
    "Image security scanning requires additional tooling. Consider Trivy or a similar scanner.";

fn split_command(query: &str) -> (&str, Vec<&str>) {
    let mut parts = query.split_whitespace();
    let keyword = parts.next().unwrap_or("");
    (keyword, parts.collect())
}

fn push_issue_section(
    response: &mut String,
    label: &str,
    issues: &[&Issue],
    limit: usize,
    detailed: bool,
) {
    if issues.is_empty() {
        return;
    }
    response.push_str(&format!("\n[{}] ({}):\n", label, issues.len()));
    for issue in issues.iter().take(limit) {
        response.push_str(&format!("  • {}\n", issue.title()));
        if detailed {
            response.push_str(&format!("    {}\n", issue.description()));
        }
        if label == "CRITICAL" {
            response.push_str(&format!(
                "    Resource: {}/{}\n",
                issue.resource_type(),
                issue.resource_name()
            ));
        }
    }
}

/// Render a scan result grouped by priority
pub(crate) fn format_issue_report(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "No issues detected in the cluster.".to_string();
    }

    let by = |p: Priority| issues.iter().filter(|i| i.priority() == p).collect::<Vec<_>>();
    let mut response = format!("Found {} issues:\n", issues.len());
    push_issue_section(&mut response, "CRITICAL", &by(Priority::Critical), 5, true);
    push_issue_section(&mut response, "WARNING", &by(Priority::Warning), 5, true);
    push_issue_section(&mut response, "INFO", &by(Priority::Info), 3, false);
    response
}

pub(crate) async fn troubleshooter(ctx: &AgentContext<'_>, query: &str) -> String {
    let (keyword, args) = split_command(query);

    match (keyword, args.first()) {
        ("scan", _) | ("analyze", None) => {
            let issues = ctx.scanner.scan_all(ctx.scope).await;
            format_issue_report(&issues)
        }
        ("health", _) => {
            let health = ctx.scanner.get_resource_health(ctx.scope).await;
            advisor::describe_health(&health)
        }
        ("analyze", Some(name)) => analyze_pod(ctx, name).await,
        _ => "Available commands: scan, analyze [resource], health".to_string(),
    }
}

async fn analyze_pod(ctx: &AgentContext<'_>, name: &str) -> String {
    let pods = ctx.scanner.client().get_pods(ctx.scope).await;
    let Some(pod) = pods.iter().find(|p| p.name.contains(name)) else {
        return format!("Resource '{}' not found or not accessible.", name);
    };

    let mut response = format!(
        "Analysis for pod {}:\nStatus: {}\nReady: {}\nRestarts: {}\nNode: {}\n\n",
        pod.name,
        pod.status,
        pod.ready,
        pod.restarts,
        pod.node.as_deref().unwrap_or("<none>")
    );

    let issues = pod_issues(pod);
    if issues.is_empty() {
        response.push_str("No specific issues detected for this pod.\n");
    } else {
        response.push_str("Issues detected:\n");
        for issue in &issues {
            response.push_str(&format!("  • {}\n    {}\n", issue.title(), issue.description()));
            response.push_str(&format!("    Advice: {}\n\n", advisor::analyze_issue(issue)));
        }
    }
    response
}

pub(crate) async fn discovery(ctx: &AgentContext<'_>, query: &str) -> String {
    let client = ctx.scanner.client();

    match query.trim() {
        "pods" => {
            let pods = client.get_pods(ctx.scope).await;
            let mut response = format!("Found {} pods:\n", pods.len());
            for pod in pods.iter().take(LIST_LIMIT) {
                let marker = if pod.is_healthy() { "ok" } else { "!!" };
                response.push_str(&format!("[{}] {} ({})\n", marker, pod.name, pod.status));
            }
            response
        }
        "deployments" => {
            let deployments = client.get_deployments(ctx.scope).await;
            let mut response = format!("Found {} deployments:\n", deployments.len());
            for dep in deployments.iter().take(LIST_LIMIT) {
                let marker = if dep.is_healthy() { "ok" } else { "!!" };
                response.push_str(&format!(
                    "[{}] {} ({}/{})\n",
                    marker, dep.name, dep.ready, dep.replicas
                ));
            }
            response
        }
        "events" => {
            let events = client.get_events(ctx.scope).await;
            let mut response = String::from("Recent events:\n");
            for event in events.iter().take(LIST_LIMIT) {
                let preview: String = event.message.chars().take(EVENT_MESSAGE_PREVIEW).collect();
                let ellipsis = if event.message.chars().count() > EVENT_MESSAGE_PREVIEW {
                    "..."
                } else {
                    ""
                };
                response.push_str(&format!(
                    "[{}] {} on {}\n   {}{}\n\n",
                    event.event_type, event.reason, event.object_name, preview, ellipsis
                ));
            }
            response
        }
        _ => "Available commands: pods, deployments, events".to_string(),
    }
}

pub(crate) async fn logs(ctx: &AgentContext<'_>, query: &str) -> String {
    let (keyword, args) = split_command(query);
    let client = ctx.scanner.client();
    let namespace = ctx.namespace();

    match keyword {
        "get" => {
            let Some(pod) = args.first() else {
                return "Please specify a pod name. Example: get web-app-123".to_string();
            };
            let lines = args
                .get(1)
                .and_then(|n| n.parse::<i64>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_LOG_LINES);
            let logs = client.get_pod_logs_in(namespace, pod, lines).await;
            format!("Logs for {} (last {} lines):\n{}", pod, lines, logs)
        }
        "errors" => {
            let Some(pod) = args.first() else {
                return "Please specify a pod name. Example: errors web-app-123".to_string();
            };
            let logs = client.get_pod_logs_in(namespace, pod, ERROR_SCAN_LINES).await;
            let errors: Vec<&str> = logs
                .lines()
                .filter(|line| {
                    let lower = line.to_lowercase();
                    ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
                })
                .collect();

            if errors.is_empty() {
                format!("No error patterns found in {} logs.", pod)
            } else {
                let start = errors.len().saturating_sub(MAX_ERROR_LINES);
                format!("Error patterns in {} logs:\n{}", pod, errors[start..].join("\n"))
            }
        }
        _ => "Available commands: get <pod-name> [lines], errors <pod-name>".to_string(),
    }
}

pub(crate) async fn resource(ctx: &AgentContext<'_>, query: &str) -> String {
    let (keyword, args) = split_command(query);

    match (keyword, args.as_slice()) {
        ("top", _) => TOP_HINT.to_string(),
        ("pressure", _) => {
            let events = ctx.scanner.client().get_events(ctx.scope).await;
            let pressure: Vec<_> = events
                .iter()
                .filter(|e| {
                    PRESSURE_REASONS.contains(&e.reason.as_str())
                        || e.message.contains("Insufficient")
                })
                .collect();

            if pressure.is_empty() {
                format!("No immediate resource pressure detected in {}.", ctx.scope)
            } else {
                let mut response = format!("Resource pressure signals ({}):\n", pressure.len());
                for event in pressure.iter().take(LIST_LIMIT) {
                    response.push_str(&format!(
                        "  • {} on {}/{}: {}\n",
                        event.reason, event.object_kind, event.object_name, event.message
                    ));
                }
                response
            }
        }
        ("describe", [kind, name, ..]) => {
            format!("Run: kubectl describe {} {} -n {}", kind, name, ctx.namespace())
        }
        ("describe", _) => "Usage: describe <resource-type> <resource-name>".to_string(),
        _ => "Available commands: top, pressure, describe <type> <name>".to_string(),
    }
}

fn format_findings(heading: &str, empty: &str, issues: &[Issue]) -> String {
    if issues.is_empty() {
        return empty.to_string();
    }
    let mut response = format!("{} ({}):\n", heading, issues.len());
    for issue in issues {
        response.push_str(&format!(
            "  • {} [{}/{}]\n    {}\n",
            issue.title(),
            issue.namespace(),
            issue.resource_name(),
            issue.description()
        ));
    }
    response
}

pub(crate) async fn network(ctx: &AgentContext<'_>, query: &str) -> String {
    let namespace = ctx.namespace();

    match query.trim() {
        "connectivity" => CONNECTIVITY_HINT.to_string(),
        "policies" => format!(
            "Run: kubectl get networkpolicies -n {} to view network policies.",
            namespace
        ),
        "endpoints" => format!(
            "Run: kubectl get endpoints -n {} to view service endpoints.",
            namespace
        ),
        "issues" => {
            let events = ctx.scanner.client().get_events(ctx.scope).await;
            format_findings(
                "Possible network policy issues",
                "No network policy issues detected.",
                &network_policy_issues(&events),
            )
        }
        _ => "Available commands: connectivity, policies, endpoints, issues".to_string(),
    }
}

pub(crate) async fn security(ctx: &AgentContext<'_>, query: &str) -> String {
    match query.trim() {
        "rbac" => "Run: kubectl auth can-i --list to view RBAC permissions.".to_string(),
        "secrets" => format!(
            "Run: kubectl get secrets -n {} to review secrets. Secret contents are never read.",
            ctx.namespace()
        ),
        "images" => IMAGE_SCAN_HINT.to_string(),
        "policies" => {
            let events = ctx.scanner.client().get_events(ctx.scope).await;
            format_findings(
                "Policy violations",
                "No policy violations detected.",
                &policy_violation_issues(&events),
            )
        }
        _ => "Available commands: rbac, secrets, images, policies".to_string(),
    }
}
