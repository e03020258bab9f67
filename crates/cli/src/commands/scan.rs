//! Scan, health and log commands

use super::Session;
use crate::output::{
    print_error, print_health, print_info, print_issues, print_success, print_warning,
    OutputFormat,
};
use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use stargazer_lib::{advisor, storage::DEFAULT_MAX_ENTRIES, IssueStore};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Scan once, or repeatedly until Ctrl-C when `continuous` is set
pub async fn scan(
    session: &Session,
    namespace: Option<&str>,
    continuous: bool,
    interval: Duration,
    store: Option<&Path>,
) -> Result<()> {
    let scope = session.scope(namespace);
    let store = store.map(|path| IssueStore::open(path, DEFAULT_MAX_ENTRIES));

    loop {
        if session.format == OutputFormat::Table {
            print_info(&format!(
                "Scanning {} at {}...",
                scope,
                Local::now().format("%H:%M:%S")
            ));
        }

        let report = session.scanner.scan_report(&scope).await;
        debug!(
            issues = report.issues.len(),
            failed_rules = report.failures.len(),
            failed_reads = report.read_failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Scan complete"
        );
        if session.format == OutputFormat::Table {
            for failure in &report.read_failures {
                print_warning(&format!("Could not read {}", failure));
            }
        }
        print_issues(&report.issues, session.format)?;

        if let Some(store) = &store {
            if let Err(e) = store.append_all(report.issues) {
                print_error(&format!("Failed to store issues: {}", e));
            }
        }

        if !continuous {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                // the next cycle must see fresh state
                session.scanner.client().clear_cache();
            }
            _ = tokio::signal::ctrl_c() => {
                print_info("Stopping scan...");
                return Ok(());
            }
        }
    }
}

/// Print the health summary for a scope
pub async fn health(session: &Session, namespace: Option<&str>) -> Result<()> {
    let scope = session.scope(namespace);
    let health = session.scanner.get_resource_health(&scope).await;
    print_health(&health, &advisor::describe_health(&health), session.format)
}

/// Tail a pod's log
pub async fn logs(session: &Session, pod: &str, lines: i64, namespace: Option<&str>) -> Result<()> {
    let client = session.scanner.client();
    let namespace = session
        .config
        .namespace(namespace)
        .filter(|ns| !ns.is_empty() && *ns != "all")
        .unwrap_or_else(|| client.default_namespace());

    let logs = client.get_pod_logs_in(namespace, pod, lines).await;

    match session.format {
        OutputFormat::Json => crate::output::print_json(&serde_json::json!({
            "pod": pod,
            "namespace": namespace,
            "lines": lines,
            "logs": logs,
        })),
        OutputFormat::Table => {
            print_success(&format!(
                "Logs for {} (last {} lines):",
                pod.cyan(),
                lines
            ));
            println!("{}", "-".repeat(50));
            println!("{}", logs);
            Ok(())
        }
    }
}
