//! Canned troubleshooting advice
//!
//! Keyword-matched guidance for issues, suggested kubectl commands per
//! resource type, and a one-paragraph health narrative.

use crate::models::{Issue, Priority};
use crate::scan::ResourceHealth;

/// Advice per keyword, ordered critical / warning / info
const ADVICE: &[(&str, [&str; 3])] = &[
    (
        "crash",
        [
            "Container appears to be crashing. Check resource limits and application logs.",
            "High restart count detected. Consider increasing memory/CPU limits or fixing application errors.",
            "Pod is in CrashLoopBackOff. Review container configuration and application startup.",
        ],
    ),
    (
        "pending",
        [
            "Pod is pending. Possible causes: insufficient resources, taints/tolerations, or image pull issues.",
            "Pod scheduling failure. Check node resources and pod requirements.",
            "Pending state detected. Verify resource requests and node availability.",
        ],
    ),
    (
        "image",
        [
            "Image pull issue detected. Check image name, tag, and registry access.",
            "Container image problem. Verify image exists and registry is accessible.",
            "Image pull failure. Check credentials and image repository.",
        ],
    ),
    (
        "network",
        [
            "Network connectivity issue detected. Check service configuration and network policies.",
            "Communication problem between services. Review endpoints and service discovery.",
            "Network policy might be blocking traffic. Verify ingress/egress rules.",
        ],
    ),
    (
        "resource",
        [
            "Resource exhaustion detected. Check CPU/memory usage and limits.",
            "Insufficient resources. Consider scaling up or optimizing resource usage.",
            "Resource pressure on node. Monitor node utilization and pod distribution.",
        ],
    ),
];

const GENERAL_ADVICE: [&str; 3] = [
    "Issue detected in the cluster. Run `kubectl describe` for more details.",
    "Kubernetes resource needs attention. Check logs and events for context.",
    "Cluster resource state requires investigation. Use kubectl for deeper analysis.",
];

/// Warning events above this count are called out in the narrative
const WARNING_EVENT_THRESHOLD: usize = 5;

/// Advice text for one issue, picked by keyword then by priority
pub fn analyze_issue(issue: &Issue) -> &'static str {
    let text = format!("{} {}", issue.title(), issue.description()).to_lowercase();

    let advice = ADVICE
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, advice)| advice)
        .unwrap_or(&GENERAL_ADVICE);

    match issue.priority() {
        Priority::Critical => advice[0],
        Priority::Warning => advice[1],
        Priority::Info => advice[2],
    }
}

/// kubectl commands worth running for an issue
pub fn suggest_commands(issue: &Issue) -> Vec<String> {
    let (name, ns) = (issue.resource_name(), issue.namespace());
    let mut commands = match issue.resource_type() {
        "pod" => vec![
            format!("kubectl describe pod {} -n {}", name, ns),
            format!("kubectl logs {} -n {}", name, ns),
            format!(
                "kubectl get events -n {} --field-selector involvedObject.name={}",
                ns, name
            ),
        ],
        "deployment" => vec![
            format!("kubectl describe deployment {} -n {}", name, ns),
            format!("kubectl rollout status deployment/{} -n {}", name, ns),
            format!("kubectl get pods -l app={} -n {}", name, ns),
        ],
        _ => Vec::new(),
    };

    commands.push(format!(
        "kubectl get events -n {} --sort-by='.lastTimestamp'",
        ns
    ));
    commands.push(format!("kubectl top pods -n {}", ns));
    commands
}

/// Short narrative over a health summary
pub fn describe_health(health: &ResourceHealth) -> String {
    if health.is_healthy() {
        return "Cluster appears healthy. All pods and deployments are running as expected."
            .to_string();
    }

    let mut concerns = Vec::new();
    if health.pods.unhealthy() > 0 {
        concerns.push(format!("{} pods are unhealthy", health.pods.unhealthy()));
    }
    if health.deployments.unhealthy() > 0 {
        concerns.push(format!(
            "{} deployments have issues",
            health.deployments.unhealthy()
        ));
    }
    if health.events.errors > 0 {
        concerns.push(format!("{} error events detected", health.events.errors));
    }
    if health.events.warnings > WARNING_EVENT_THRESHOLD {
        concerns.push(format!(
            "{} warning events (high)",
            health.events.warnings
        ));
    }

    if concerns.is_empty() {
        "Cluster has some concerns but no immediate critical issues.".to_string()
    } else {
        format!(
            "Cluster health degraded: {}. Investigate critical issues first.",
            concerns.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{EventTally, HealthTally, OverallHealth};

    fn issue(title: &str, priority: Priority, resource_type: &str) -> Issue {
        Issue::new("id", title, "", priority, resource_type, "web-1", "shop")
    }

    fn health(
        pods: (usize, usize),
        deployments: (usize, usize),
        events: (usize, usize),
    ) -> ResourceHealth {
        let pods = HealthTally {
            total: pods.0,
            healthy: pods.1,
        };
        let deployments = HealthTally {
            total: deployments.0,
            healthy: deployments.1,
        };
        let overall_health = if pods.total > 0
            && pods.unhealthy() == 0
            && deployments.unhealthy() == 0
        {
            OverallHealth::Healthy
        } else {
            OverallHealth::Degraded
        };
        ResourceHealth {
            pods,
            deployments,
            events: EventTally { warnings: events.0, errors: events.1 },
            overall_health,
        }
    }

    #[test]
    fn test_keyword_and_priority_select_advice() {
        let critical = issue("Pod web-1 in CrashLoopBackOff state", Priority::Critical, "pod");
        assert!(analyze_issue(&critical).starts_with("Container appears to be crashing"));

        let warning = issue("Pod web-1 in Pending state", Priority::Warning, "pod");
        assert!(analyze_issue(&warning).starts_with("Pod scheduling failure"));

        let info = issue("Rescheduled on Pod/web-1", Priority::Info, "pod");
        assert_eq!(analyze_issue(&info), GENERAL_ADVICE[2]);
    }

    #[test]
    fn test_pod_and_deployment_commands() {
        let pod = suggest_commands(&issue("t", Priority::Warning, "pod"));
        assert_eq!(pod.len(), 5);
        assert_eq!(pod[0], "kubectl describe pod web-1 -n shop");

        let deployment = suggest_commands(&issue("t", Priority::Warning, "deployment"));
        assert!(deployment
            .iter()
            .any(|c| c == "kubectl rollout status deployment/web-1 -n shop"));

        let other = suggest_commands(&issue("t", Priority::Info, "node"));
        assert_eq!(other.len(), 2);
        assert_eq!(other[1], "kubectl top pods -n shop");
    }

    #[test]
    fn test_health_narrative() {
        let healthy = describe_health(&health((2, 2), (1, 1), (0, 0)));
        assert!(healthy.starts_with("Cluster appears healthy"));

        let degraded = describe_health(&health((3, 1), (2, 1), (7, 2)));
        assert_eq!(
            degraded,
            "Cluster health degraded: 2 pods are unhealthy, 1 deployments have issues, \
             2 error events detected, 7 warning events (high). Investigate critical issues first."
        );

        let empty = describe_health(&health((0, 0), (0, 0), (0, 0)));
        assert_eq!(empty, "Cluster has some concerns but no immediate critical issues.");
    }
}
