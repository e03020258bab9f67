//! Tests for scan rules and the orchestrator

use super::*;
use crate::models::{generate_issue_id, ContainerWaiting, Priority};
use crate::testing::{deployment, event, pod, FakeSource};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

/// Rule that always fails
struct BrokenRule(&'static str);

#[async_trait]
impl ScanRule for BrokenRule {
    fn name(&self) -> &'static str {
        self.0
    }

    async fn scan(&self, _client: &ClusterClient, _scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        Err(ScanError::Rule("simulated failure".into()))
    }
}

/// Rule that panics mid-scan
struct PanickingRule;

#[async_trait]
impl ScanRule for PanickingRule {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn scan(&self, _client: &ClusterClient, _scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        panic!("rule exploded");
    }
}

/// Rule that finishes late
struct SlowRule;

#[async_trait]
impl ScanRule for SlowRule {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn scan(&self, _client: &ClusterClient, _scope: &Scope) -> Result<Vec<Issue>, ScanError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(vec![Issue::new("slow", "slow", "slow", Priority::Info, "pod", "slow", "default")])
    }
}

fn priorities(issues: &[Issue]) -> Vec<Priority> {
    issues.iter().map(|i| i.priority()).collect()
}

mod classification_tests {
    use super::*;

    #[test]
    fn test_crashloop_pod_is_one_critical_issue() {
        let issues = pod_issues(&pod("web-1", "default", "CrashLoopBackOff", false, 0));
        assert_eq!(priorities(&issues), vec![Priority::Critical]);
        assert!(issues[0].description().contains("--previous"));
    }

    #[test]
    fn test_pending_pod_is_one_warning_issue() {
        let issues = pod_issues(&pod("web-1", "default", "Pending", false, 0));
        assert_eq!(priorities(&issues), vec![Priority::Warning]);
        assert_eq!(issues[0].id(), generate_issue_id("web-1", "status"));
        assert_eq!(issues[0].title(), "Pod web-1 in Pending state");
    }

    #[test]
    fn test_failed_and_error_pods_are_critical() {
        for status in ["Failed", "Error"] {
            let issues = pod_issues(&pod("job-1", "batch", status, false, 0));
            assert_eq!(priorities(&issues), vec![Priority::Critical], "status {}", status);
        }
    }

    #[test]
    fn test_healthy_pods_produce_nothing() {
        assert!(pod_issues(&pod("web-1", "default", "Running", true, 5)).is_empty());
        assert!(pod_issues(&pod("job-1", "default", "Succeeded", false, 0)).is_empty());
    }

    #[test]
    fn test_restart_and_readiness_checks() {
        let issues = pod_issues(&pod("web-1", "default", "Running", false, 6));
        let titles: Vec<&str> = issues.iter().map(|i| i.title()).collect();

        assert_eq!(issues.len(), 2);
        assert!(titles.contains(&"High restart count for web-1"));
        assert!(titles.contains(&"Pod web-1 not ready"));
        assert!(issues.iter().all(|i| i.priority() == Priority::Warning));
    }

    #[test]
    fn test_waiting_container_issue() {
        let mut record = pod("web-1", "default", "Running", true, 0);
        record.waiting = vec![
            ContainerWaiting {
                container: "app".into(),
                reason: "ImagePullBackOff".into(),
                message: "Back-off pulling image".into(),
            },
            ContainerWaiting {
                container: "init".into(),
                reason: "ContainerCreating".into(),
                message: String::new(),
            },
        ];

        let issues = pod_issues(&record);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].id(), generate_issue_id("web-1", "container-app"));
        assert_eq!(issues[0].priority(), Priority::Critical);
        assert_eq!(issues[1].priority(), Priority::Warning);
        assert_eq!(issues[1].description(), "Container is waiting: ContainerCreating.");
    }

    #[test]
    fn test_unavailable_deployment_is_critical() {
        let issues = deployment_issues(&deployment("api", "prod", 3, 3, 1));
        assert_eq!(priorities(&issues), vec![Priority::Critical]);
        assert_eq!(issues[0].title(), "Deployment api unavailable");
        assert_eq!(issues[0].description(), "Only 1 of 3 replicas available");
    }

    #[test]
    fn test_replica_mismatch_is_warning_only() {
        let issues = deployment_issues(&deployment("api", "prod", 3, 2, 3));
        assert_eq!(priorities(&issues), vec![Priority::Warning]);
        assert_eq!(issues[0].description(), "Expected 3 replicas, 2 ready");
    }

    #[test]
    fn test_healthy_deployment_produces_nothing() {
        assert!(deployment_issues(&deployment("api", "prod", 2, 2, 2)).is_empty());
    }
}

mod event_tests {
    use super::*;

    #[test]
    fn test_groups_keep_latest_recent_event() {
        let now = Utc::now();
        let ago = |minutes| Some(now - ChronoDuration::minutes(minutes));
        let events = vec![
            event("shop", "Warning", "BackOff", "older", ("Pod", "web-1"), ago(20)),
            event("shop", "Warning", "BackOff", "newest", ("Pod", "web-1"), ago(1)),
            event("shop", "Warning", "BackOff", "stale", ("Pod", "web-2"), ago(120)),
            event("shop", "Warning", "Unhealthy", "probe", ("Pod", "web-1"), None),
        ];

        let issues = correlate_events(&events, now);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].description(), "newest");
        assert_eq!(issues[0].title(), "BackOff on Pod/web-1");
        assert_eq!(issues[0].resource_type(), "pod");
    }

    #[test]
    fn test_event_priority_classification() {
        let now = Utc::now();
        let recent = Some(now - ChronoDuration::minutes(5));
        let events = vec![
            event("a", "Warning", "FailedMount", "m", ("Pod", "p1"), recent),
            event("a", "Warning", "BackOff", "m", ("Pod", "p2"), recent),
            event("a", "Custom", "Rescheduled", "m", ("Pod", "p3"), recent),
        ];

        let issues = correlate_events(&events, now);
        let by_name = |name: &str| {
            issues
                .iter()
                .find(|i| i.resource_name() == name)
                .unwrap()
                .priority()
        };

        assert_eq!(by_name("p1"), Priority::Critical);
        assert_eq!(by_name("p2"), Priority::Warning);
        assert_eq!(by_name("p3"), Priority::Info);
    }

    #[test]
    fn test_long_message_is_truncated() {
        let now = Utc::now();
        let message = "x".repeat(250);
        let events = vec![event("a", "Warning", "BackOff", &message, ("Pod", "p1"), Some(now))];

        let issues = correlate_events(&events, now);
        let description = issues[0].description();
        assert_eq!(description.chars().count(), MAX_EVENT_DESCRIPTION);
        assert!(description.ends_with("..."));

        let exact = "y".repeat(MAX_EVENT_DESCRIPTION);
        let events = vec![event("a", "Warning", "BackOff", &exact, ("Pod", "p1"), Some(now))];
        assert_eq!(correlate_events(&events, now)[0].description(), exact);
    }

    #[test]
    fn test_distinct_reasons_get_distinct_ids() {
        let now = Utc::now();
        let events = vec![
            event("a", "Warning", "BackOff", "m", ("Pod", "p1"), Some(now)),
            event("a", "Warning", "Unhealthy", "m", ("Pod", "p1"), Some(now)),
        ];

        let issues = correlate_events(&events, now);
        assert_eq!(issues.len(), 2);
        assert_ne!(issues[0].id(), issues[1].id());
    }
}

mod heuristic_tests {
    use super::*;

    #[test]
    fn test_istio_pod_not_ready() {
        let mut meshed = pod("web-1", "shop", "Running", false, 0);
        meshed.labels = BTreeMap::from([(
            "sidecar.istio.io/inject".to_string(),
            "true".to_string(),
        )]);
        let plain = pod("web-2", "shop", "Running", false, 0);

        let issues = service_mesh_issues(&[meshed, plain]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].resource_name(), "web-1");
        assert_eq!(issues[0].id(), generate_issue_id("web-1", "istio-sidecar"));
    }

    #[test]
    fn test_network_policy_keyword_match_limited_to_latest_five() {
        let now = Some(Utc::now());
        let mut events: Vec<_> = (0..7)
            .map(|i| {
                event(
                    "shop",
                    "Warning",
                    "FailedCreatePodSandBox",
                    "network plugin returned error",
                    ("Pod", &format!("p{}", i)),
                    now,
                )
            })
            .collect();
        events.push(event("shop", "Warning", "Forbidden", "access denied", ("Pod", "q"), now));

        let issues = network_policy_issues(&events);
        let names: Vec<&str> = issues.iter().map(|i| i.resource_name()).collect();

        // the last five keyword matches are p3..p6 and q; q lacks network/policy wording
        assert_eq!(names, vec!["p3", "p4", "p5", "p6"]);
    }

    #[test]
    fn test_policy_violation_detection() {
        let now = Some(Utc::now());
        let events = vec![
            event(
                "shop",
                "Warning",
                "PolicyViolation",
                "require-labels: validation violation",
                ("Pod", "a"),
                now,
            ),
            event(
                "shop",
                "Warning",
                "Blocked",
                "admission webhook kyverno denied",
                ("Pod", "b"),
                now,
            ),
            event("shop", "Warning", "BackOff", "restarting", ("Pod", "c"), now),
        ];

        let issues = policy_violation_issues(&events);
        let names: Vec<&str> = issues.iter().map(|i| i.resource_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(issues.iter().all(|i| i.priority() == Priority::Warning));
    }
}

mod orchestrator_tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_scenario() {
        let (_source, client) = FakeSource::new()
            .with_pods(vec![pod("web-42", "default", "Running", true, 8)])
            .with_deployments(vec![deployment("api", "default", 3, 3, 1)])
            .into_client();
        let scanner = Scanner::new(client);

        let issues = scanner.scan_all(&Scope::Cluster).await;

        assert!(issues.iter().any(|i| i.resource_name() == "web-42"
            && i.priority() == Priority::Warning
            && i.title().contains("High restart count")));
        assert!(issues.iter().any(|i| i.resource_name() == "api"
            && i.priority() == Priority::Critical
            && i.title().contains("unavailable")));
    }

    #[tokio::test]
    async fn test_failing_rule_does_not_hide_others() {
        let (_source, client) = FakeSource::new()
            .with_pods(vec![pod("web-1", "default", "CrashLoopBackOff", false, 0)])
            .with_deployments(vec![deployment("api", "default", 3, 3, 1)])
            .into_client();
        let rules: Vec<Arc<dyn ScanRule>> = vec![
            Arc::new(PodRule),
            Arc::new(DeploymentRule),
            Arc::new(BrokenRule("events")),
        ];
        let scanner = Scanner::with_rules(client, rules);

        let report = scanner.scan_report(&Scope::Cluster).await;

        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].rule, "events");
        assert!(matches!(report.failures[0].error, ScanError::Rule(_)));
    }

    #[tokio::test]
    async fn test_panicking_rule_is_captured() {
        let (_source, client) = FakeSource::new()
            .with_deployments(vec![deployment("api", "default", 2, 1, 2)])
            .into_client();
        let rules: Vec<Arc<dyn ScanRule>> = vec![Arc::new(PanickingRule), Arc::new(DeploymentRule)];
        let scanner = Scanner::with_rules(client, rules);

        let report = scanner.scan_report(&Scope::Cluster).await;

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.failures[0].rule, "panicking");
        assert!(matches!(report.failures[0].error, ScanError::Aborted(_)));
    }

    #[tokio::test]
    async fn test_scan_waits_for_slow_rules() {
        let (_source, client) = FakeSource::new().into_client();
        let rules: Vec<Arc<dyn ScanRule>> = vec![Arc::new(SlowRule), Arc::new(PodRule)];
        let scanner = Scanner::with_rules(client, rules);

        let issues = scanner.scan_all(&Scope::Cluster).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].resource_name(), "slow");
    }

    #[tokio::test]
    async fn test_source_outage_degrades_to_fewer_issues() {
        let source = FakeSource::new()
            .with_pods(vec![pod("web-1", "default", "Pending", false, 0)])
            .with_deployments(vec![deployment("api", "default", 3, 3, 1)]);
        source.fail_deployments.store(true, Ordering::SeqCst);
        let (_source, client) = source.into_client();

        let report = Scanner::new(client).scan_report(&Scope::Cluster).await;

        assert!(report.failures.is_empty());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].resource_name(), "web-1");
        assert_eq!(report.read_failures.len(), 1);
        assert_eq!(report.read_failures[0].kind, ResourceKind::Deployments);
        assert!(!report.cluster_unreachable());
    }

    #[tokio::test]
    async fn test_total_outage_is_reported_as_unreachable() {
        let source = FakeSource::new();
        for flag in [
            &source.fail_pods,
            &source.fail_deployments,
            &source.fail_events,
        ] {
            flag.store(true, Ordering::SeqCst);
        }
        let (_source, client) = source.into_client();

        let report = Scanner::new(client).scan_report(&Scope::Cluster).await;

        assert!(report.issues.is_empty());
        assert!(report.failures.is_empty());
        assert!(report.cluster_unreachable());
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_not_merged() {
        let (_source, client) = FakeSource::new()
            .with_pods(vec![pod("web-1", "default", "Pending", false, 0)])
            .into_client();
        let rules: Vec<Arc<dyn ScanRule>> = vec![Arc::new(PodRule), Arc::new(PodRule)];

        let issues = Scanner::with_rules(client, rules).scan_all(&Scope::Cluster).await;
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].id(), issues[1].id());
    }

    #[tokio::test]
    async fn test_scope_normalization_reaches_source() {
        let (source, client) = FakeSource::new()
            .with_pods(vec![
                pod("a", "ns1", "Pending", false, 0),
                pod("b", "ns2", "Pending", false, 0),
            ])
            .into_client();
        let scanner = Scanner::with_rules(client.clone(), vec![Arc::new(PodRule)]);

        let mut cluster_wide = Vec::new();
        for arg in [None, Some(""), Some("all")] {
            client.clear_cache();
            let issues = scanner.scan_all(&Scope::from_arg(arg)).await;
            cluster_wide.push(issues.len());
        }
        assert_eq!(cluster_wide, vec![2, 2, 2]);

        let scoped = scanner.scan_all(&Scope::from_arg(Some("ns1"))).await;
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].namespace(), "ns1");

        let scopes = source.scopes.lock().unwrap().clone();
        assert_eq!(&scopes[..3], &[Scope::Cluster, Scope::Cluster, Scope::Cluster]);
        assert_eq!(scopes[3], Scope::namespace("ns1"));
    }
}

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_healthy_cluster() {
        let (_source, client) = FakeSource::new()
            .with_pods(vec![pod("web-1", "default", "Running", true, 0)])
            .with_deployments(vec![deployment("web", "default", 1, 1, 1)])
            .into_client();

        let health = Scanner::new(client).get_resource_health(&Scope::Cluster).await;

        assert!(health.is_healthy());
        assert_eq!(health.pods, HealthTally { total: 1, healthy: 1 });
        assert_eq!(health.deployments, HealthTally { total: 1, healthy: 1 });
    }

    #[tokio::test]
    async fn test_empty_cluster_is_degraded() {
        let (_source, client) = FakeSource::new().into_client();
        let health = Scanner::new(client).get_resource_health(&Scope::Cluster).await;

        assert_eq!(health.overall_health, OverallHealth::Degraded);
        assert_eq!(health.pods.total, 0);
    }

    #[test]
    fn test_summary_counts() {
        let now = Some(Utc::now());
        let health = ResourceHealth::summarize(
            &[
                pod("a", "d", "Running", true, 0),
                pod("b", "d", "Running", false, 0),
                pod("c", "d", "Pending", false, 0),
            ],
            &[deployment("x", "d", 2, 1, 1), deployment("y", "d", 1, 1, 1)],
            &[
                event("d", "Warning", "BackOff", "m", ("Pod", "b"), now),
                event("d", "Warning", "FailedScheduling", "m", ("Pod", "c"), now),
                event("d", "Error", "ImagePullError", "m", ("Pod", "c"), now),
            ],
        );

        assert_eq!(health.pods, HealthTally { total: 3, healthy: 1 });
        assert_eq!(health.pods.unhealthy(), 2);
        assert_eq!(health.deployments, HealthTally { total: 2, healthy: 1 });
        assert_eq!(health.events, EventTally { warnings: 2, errors: 2 });
        assert_eq!(health.overall_health, OverallHealth::Degraded);

        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["overall_health"], "degraded");
        assert_eq!(json["pods"]["total"], 3);
    }
}
