//! Observability infrastructure for the scanner
//!
//! Provides:
//! - Prometheus metrics (scan latency, issues by priority, rule failures, cache behaviour)
//! - Structured JSON logging with tracing

use crate::models::{Issue, Priority};
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for scan latency (in seconds)
const SCAN_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Instance name for log records, taken from the downward API when present
pub fn instance_name() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "stargazer".to_string())
}

/// Metrics registered in the default registry (registered once)
static GLOBAL_METRICS: OnceLock<Arc<ScannerMetricsInner>> = OnceLock::new();

struct ScannerMetricsInner {
    scan_latency_seconds: Histogram,
    issues_detected: IntGaugeVec,
    rule_failures: IntCounterVec,
    cache_hits: IntCounterVec,
    cache_misses: IntCounterVec,
    live_read_errors: IntCounterVec,
}

impl ScannerMetricsInner {
    fn register(registry: &Registry) -> prometheus::Result<Self> {
        let scan_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "stargazer_scan_latency_seconds",
                "Time spent running one full scan cycle",
            )
            .buckets(SCAN_LATENCY_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(scan_latency_seconds.clone()))?;

        let issues_detected = IntGaugeVec::new(
            Opts::new(
                "stargazer_issues_detected",
                "Issues found by the most recent scan, by priority",
            ),
            &["priority"],
        )?;
        registry.register(Box::new(issues_detected.clone()))?;

        Ok(Self {
            scan_latency_seconds,
            issues_detected,
            rule_failures: counter_vec(
                registry,
                "stargazer_rule_failures_total",
                "Scan rules that failed and contributed no issues",
                "rule",
            )?,
            cache_hits: counter_vec(
                registry,
                "stargazer_cache_hits_total",
                "Cluster reads served from cache",
                "kind",
            )?,
            cache_misses: counter_vec(
                registry,
                "stargazer_cache_misses_total",
                "Cluster reads that required a live fetch",
                "kind",
            )?,
            live_read_errors: counter_vec(
                registry,
                "stargazer_live_read_errors_total",
                "Live control-plane reads that failed",
                "kind",
            )?,
        })
    }
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    label: &str,
) -> prometheus::Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), &[label])?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Handle to the scanner metrics.
///
/// Handles from `new` share the metrics in the default registry that
/// `/metrics` exposes.
#[derive(Clone)]
pub struct ScannerMetrics {
    inner: Arc<ScannerMetricsInner>,
}

impl Default for ScannerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerMetrics {
    /// Handle to the default-registry metrics, registering them on first use
    pub fn new() -> Self {
        let inner = GLOBAL_METRICS.get_or_init(|| {
            Arc::new(
                ScannerMetricsInner::register(prometheus::default_registry())
                    .expect("Failed to register scanner metrics"),
            )
        });
        Self {
            inner: Arc::clone(inner),
        }
    }

    /// Metrics registered in `registry` instead of the default one
    pub fn with_registry(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            inner: Arc::new(ScannerMetricsInner::register(registry)?),
        })
    }

    pub fn observe_scan_latency(&self, elapsed: Duration) {
        self.inner.scan_latency_seconds.observe(elapsed.as_secs_f64());
    }

    /// Replace the per-priority gauges with counts from the latest scan
    pub fn set_issue_counts(&self, issues: &[Issue]) {
        for priority in [Priority::Critical, Priority::Warning, Priority::Info] {
            let count = issues.iter().filter(|i| i.priority() == priority).count();
            self.inner
                .issues_detected
                .with_label_values(&[priority.as_str()])
                .set(count as i64);
        }
    }

    pub fn inc_rule_failures(&self, rule: &str) {
        self.inner.rule_failures.with_label_values(&[rule]).inc();
    }

    pub fn inc_cache_hit(&self, kind: &str) {
        self.inner.cache_hits.with_label_values(&[kind]).inc();
    }

    pub fn inc_cache_miss(&self, kind: &str) {
        self.inner.cache_misses.with_label_values(&[kind]).inc();
    }

    pub fn inc_live_read_errors(&self, kind: &str) {
        self.inner.live_read_errors.with_label_values(&[kind]).inc();
    }
}

/// Structured logger for scanner events
///
/// Provides consistent JSON-formatted logging for scan cycles,
/// rule failures and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log the outcome of a scan cycle
    pub fn log_scan_cycle(
        &self,
        scope: &str,
        issues: &[Issue],
        failed_rules: usize,
        failed_reads: usize,
        elapsed: Duration,
    ) {
        let count = |p: Priority| issues.iter().filter(|i| i.priority() == p).count();
        info!(
            event = "scan_cycle",
            instance = %self.instance,
            scope = %scope,
            total = issues.len(),
            critical = count(Priority::Critical),
            warning = count(Priority::Warning),
            info = count(Priority::Info),
            failed_rules = failed_rules,
            failed_reads = failed_reads,
            elapsed_ms = elapsed.as_millis() as u64,
            "Scan cycle complete"
        );
    }

    /// Log a rule that failed during fan-in
    pub fn log_rule_failure(&self, rule: &str, error: &str, advisory: bool) {
        if advisory {
            tracing::debug!(
                event = "rule_failed",
                instance = %self.instance,
                rule = %rule,
                error = %error,
                "Advisory scan rule failed"
            );
        } else {
            warn!(
                event = "rule_failed",
                instance = %self.instance,
                rule = %rule,
                error = %error,
                "Scan rule failed, contributing no issues"
            );
        }
    }

    /// Log a critical finding
    pub fn log_issue(&self, issue: &Issue) {
        if issue.priority() == Priority::Critical {
            warn!(
                event = "issue_detected",
                instance = %self.instance,
                issue_id = %issue.id(),
                priority = %issue.priority().as_str(),
                resource_type = %issue.resource_type(),
                resource_name = %issue.resource_name(),
                namespace = %issue.namespace(),
                "{}",
                issue.title()
            );
        }
    }

    pub fn log_startup(&self, version: &str, scope: &str) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            scope = %scope,
            "Stargazer agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Stargazer agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_metrics_creation() {
        let metrics = ScannerMetrics::new();

        metrics.observe_scan_latency(Duration::from_millis(120));
        metrics.inc_rule_failures("events");
        metrics.inc_cache_hit("pods");
        metrics.inc_cache_miss("pods");
        metrics.inc_live_read_errors("deployments");
        metrics.set_issue_counts(&[]);
    }

    #[test]
    fn test_issue_gauge_tracks_latest_counts() {
        let registry = Registry::new();
        let metrics = ScannerMetrics::with_registry(&registry).unwrap();
        let gauge = |priority: Priority| {
            metrics
                .inner
                .issues_detected
                .with_label_values(&[priority.as_str()])
                .get()
        };
        let critical = Issue::new("c", "t", "d", Priority::Critical, "pod", "web", "default");
        let warning = Issue::new("w", "t", "d", Priority::Warning, "pod", "api", "default");

        metrics.set_issue_counts(&[critical.clone(), critical.clone(), warning]);
        assert_eq!(gauge(Priority::Critical), 2);
        assert_eq!(gauge(Priority::Warning), 1);
        assert_eq!(gauge(Priority::Info), 0);

        // A later scan replaces the counts
        metrics.set_issue_counts(&[critical]);
        assert_eq!(gauge(Priority::Critical), 1);
        assert_eq!(gauge(Priority::Warning), 0);

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "stargazer_issues_detected"));
    }

    #[test]
    fn test_registering_twice_in_one_registry_fails() {
        let registry = Registry::new();
        assert!(ScannerMetrics::with_registry(&registry).is_ok());
        assert!(ScannerMetrics::with_registry(&registry).is_err());
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.instance, "test-node");
    }
}
