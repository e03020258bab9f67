//! Stargazer library for Kubernetes troubleshooting
//!
//! This crate provides the core functionality for:
//! - Cached read-only access to pods, deployments, events and logs
//! - Concurrent, fault-isolated issue scanning
//! - A command router over troubleshooting agents
//! - Issue persistence, health checks and observability

pub mod advisor;
pub mod agents;
pub mod cluster;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod scan;
pub mod storage;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use agents::{AgentKind, AgentRouter};
pub use cluster::{ClusterClient, ClusterSource, KubeSource, ReadFailure, Scope};
pub use error::{ClusterError, ScanError, StoreError};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{ScannerMetrics, StructuredLogger};
pub use scan::{ResourceHealth, ScanLoop, ScanLoopBuilder, ScanReport, ScanRule, Scanner};
pub use storage::IssueStore;
pub use validator::validate_kubectl_command;
