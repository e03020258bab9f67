//! HTTP API for health checks, Prometheus metrics and scan results

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use stargazer_lib::{
    health::{ComponentStatus, HealthRegistry},
    models::{Issue, Priority},
    scan::ResourceHealth,
    ReadFailure,
};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

/// Result of the most recent scan cycle
#[derive(Debug, Clone, Serialize)]
pub struct LatestScan {
    pub scope: String,
    pub scanned_at: DateTime<Utc>,
    pub failed_rules: Vec<String>,
    pub failed_reads: Vec<ReadFailure>,
    pub issues: Vec<Issue>,
    pub health: ResourceHealth,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    latest: Arc<RwLock<Option<LatestScan>>>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry) -> Self {
        Self {
            health_registry,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the published scan result
    pub async fn record_scan(&self, scan: LatestScan) {
        *self.latest.write().await = Some(scan);
    }

    pub async fn latest(&self) -> Option<LatestScan> {
        self.latest.read().await.clone()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IssueFilter {
    pub priority: Option<Priority>,
    pub namespace: Option<String>,
}

#[derive(Debug, Serialize)]
struct IssuesResponse {
    scope: Option<String>,
    scanned_at: Option<DateTime<Utc>>,
    failed_rules: Vec<String>,
    failed_reads: Vec<ReadFailure>,
    total: usize,
    issues: Vec<Issue>,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Issues from the latest scan, most severe first
async fn issues(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<IssueFilter>,
) -> impl IntoResponse {
    let latest = state.latest().await;

    let response = match latest {
        Some(scan) => {
            let mut issues: Vec<Issue> = scan
                .issues
                .into_iter()
                .filter(|i| filter.priority.map_or(true, |p| i.priority() == p))
                .filter(|i| {
                    filter
                        .namespace
                        .as_deref()
                        .map_or(true, |ns| i.namespace() == ns)
                })
                .collect();
            issues.sort_by_key(|i| i.priority().rank());

            IssuesResponse {
                scope: Some(scan.scope),
                scanned_at: Some(scan.scanned_at),
                failed_rules: scan.failed_rules,
                failed_reads: scan.failed_reads,
                total: issues.len(),
                issues,
            }
        }
        None => IssuesResponse {
            scope: None,
            scanned_at: None,
            failed_rules: Vec::new(),
            failed_reads: Vec::new(),
            total: 0,
            issues: Vec::new(),
        },
    };

    Json(response)
}

/// Cluster health summary from the latest scan cycle
async fn cluster_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest().await {
        Some(scan) => (StatusCode::OK, Json(serde_json::json!(scan.health))),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no scan completed yet" })),
        ),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/issues", get(issues))
        .route("/health", get(cluster_health))
        .with_state(state)
}

/// Start the API server; returns after `shutdown` fires
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
