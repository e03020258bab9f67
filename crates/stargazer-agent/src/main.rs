//! Stargazer Agent - in-cluster troubleshooting daemon
//!
//! Scans the cluster on a fixed interval, persists detected issues and
//! serves health, metrics and the latest findings over HTTP.

use anyhow::Result;
use stargazer_agent::{api, config::AgentConfig, daemon::ReportSink};
use stargazer_lib::{
    health::HealthRegistry,
    observability::{instance_name, StructuredLogger},
    ClusterClient, IssueStore, ScanLoopBuilder, Scanner,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AgentConfig::load()?;
    let scope = config.scope();

    let logger = StructuredLogger::new(instance_name());
    logger.log_startup(AGENT_VERSION, &scope.to_string());

    let health_registry = HealthRegistry::new();

    // No usable credentials is fatal
    let connected = ClusterClient::connect(config.kubeconfig.as_deref(), config.cache_ttl()).await;
    let client = match connected {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Cannot configure cluster access");
            logger.log_shutdown("cluster configuration failed");
            return Err(e.into());
        }
    };
    info!(namespace = %client.default_namespace(), "Cluster client configured");

    let scanner = Arc::new(Scanner::new(client));
    let store = IssueStore::open(&config.storage_path, config.max_stored_issues);
    info!(path = %store.path().display(), max_entries = store.max_entries(), "Issue store opened");

    let app_state = Arc::new(api::AppState::new(health_registry.clone()));

    let (scan_loop, reports) = ScanLoopBuilder::new()
        .scanner(scanner.clone())
        .interval(config.scan_interval())
        .scope(scope)
        .build()?;

    let (shutdown_tx, _) = broadcast::channel(1);

    let loop_handle = tokio::spawn(scan_loop.run(shutdown_tx.subscribe()));
    let sink = ReportSink::new(app_state.clone(), store, scanner, logger.clone());
    let sink_handle = tokio::spawn(sink.run(reports));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.begin_shutdown().await;

    let _ = shutdown_tx.send(());
    loop_handle.await?;
    sink_handle.await?;
    api_handle.await??;

    info!("Shutdown complete");
    Ok(())
}
