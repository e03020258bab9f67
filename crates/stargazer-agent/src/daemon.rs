//! Scan report consumer
//!
//! Persists every issue, publishes the latest scan for the HTTP API and
//! keeps component health in line with the last cycle.

use crate::api::{AppState, LatestScan};
use chrono::Utc;
use stargazer_lib::{observability::StructuredLogger, scan::ScanReport, IssueStore, Scanner};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct ReportSink {
    state: Arc<AppState>,
    store: IssueStore,
    scanner: Arc<Scanner>,
    logger: StructuredLogger,
}

impl ReportSink {
    pub fn new(
        state: Arc<AppState>,
        store: IssueStore,
        scanner: Arc<Scanner>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            state,
            store,
            scanner,
            logger,
        }
    }

    /// Drain reports until the scan loop closes the channel
    pub async fn run(self, mut reports: mpsc::Receiver<ScanReport>) {
        while let Some(report) = reports.recv().await {
            self.handle(report).await;
        }
        info!("Scan report channel closed");
    }

    pub async fn handle(&self, report: ScanReport) {
        let registry = &self.state.health_registry;

        for issue in &report.issues {
            self.logger.log_issue(issue);
        }

        if report.cluster_unreachable() {
            warn!(
                failed_reads = report.read_failures.len(),
                "Control plane unreachable, scan saw an empty cluster"
            );
        }
        registry.observe_reads(&report.read_failures).await;
        registry.observe_rules(&report.failures).await;

        let store = self.store.clone();
        let batch = report.issues.clone();
        let persisted = tokio::task::spawn_blocking(move || store.append_all(batch)).await;
        let store_error = match persisted {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to persist issues");
                Some(e.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Issue persistence task aborted");
                Some(e.to_string())
            }
        };
        registry.observe_storage(store_error.as_deref()).await;

        let health = self.scanner.get_resource_health(&report.scope).await;
        self.state
            .record_scan(LatestScan {
                scope: report.scope.to_string(),
                scanned_at: Utc::now(),
                failed_rules: report.failures.iter().map(|f| f.rule.to_string()).collect(),
                failed_reads: report.read_failures,
                issues: report.issues,
                health,
            })
            .await;

        registry.complete_cycle().await;
    }
}
