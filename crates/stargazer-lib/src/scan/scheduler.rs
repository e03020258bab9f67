//! Continuous scan loop
//!
//! Runs a full scan at a fixed interval and hands each report to a channel
//! consumer. The loop stops on the shutdown signal or when the consumer goes
//! away.

use super::{ScanReport, Scanner};
use crate::cluster::Scope;
use crate::observability::{instance_name, ScannerMetrics, StructuredLogger};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Configuration for the scan loop
#[derive(Debug, Clone)]
pub struct ScanLoopConfig {
    /// Time between scan cycles (default: 30 seconds)
    pub interval: Duration,
    /// Namespace filter applied to every cycle
    pub scope: Scope,
    /// Channel buffer size for scan reports
    pub buffer_size: usize,
}

impl Default for ScanLoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            scope: Scope::Cluster,
            buffer_size: 16,
        }
    }
}

/// Periodic scanner driving one `Scanner`
pub struct ScanLoop {
    scanner: Arc<Scanner>,
    config: ScanLoopConfig,
    report_tx: mpsc::Sender<ScanReport>,
    metrics: ScannerMetrics,
    logger: StructuredLogger,
}

impl ScanLoop {
    pub fn new(
        scanner: Arc<Scanner>,
        config: ScanLoopConfig,
    ) -> (Self, mpsc::Receiver<ScanReport>) {
        let (report_tx, report_rx) = mpsc::channel(config.buffer_size.max(1));

        let scan_loop = Self {
            scanner,
            config,
            report_tx,
            metrics: ScannerMetrics::new(),
            logger: StructuredLogger::new(instance_name()),
        };

        (scan_loop, report_rx)
    }

    /// Run until `shutdown` fires or the report receiver is dropped
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            scope = %self.config.scope,
            "Starting scan loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    if self.report_tx.send(report).await.is_err() {
                        info!("Scan report receiver dropped, stopping scan loop");
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down scan loop");
                    break;
                }
            }
        }
    }

    /// One scan cycle with metrics and logging
    pub async fn run_cycle(&self) -> ScanReport {
        let report = self.scanner.scan_report(&self.config.scope).await;

        self.metrics.observe_scan_latency(report.elapsed);
        self.metrics.set_issue_counts(&report.issues);
        self.logger.log_scan_cycle(
            &report.scope.to_string(),
            &report.issues,
            report.failures.len(),
            report.read_failures.len(),
            report.elapsed,
        );

        report
    }
}

/// Builder for creating the scan loop
pub struct ScanLoopBuilder {
    scanner: Option<Arc<Scanner>>,
    config: ScanLoopConfig,
}

impl ScanLoopBuilder {
    pub fn new() -> Self {
        Self {
            scanner: None,
            config: ScanLoopConfig::default(),
        }
    }

    pub fn scanner(mut self, scanner: Arc<Scanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.config.scope = scope;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn build(self) -> Result<(ScanLoop, mpsc::Receiver<ScanReport>)> {
        let scanner = self
            .scanner
            .ok_or_else(|| anyhow::anyhow!("Scanner is required"))?;

        Ok(ScanLoop::new(scanner, self.config))
    }
}

impl Default for ScanLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
