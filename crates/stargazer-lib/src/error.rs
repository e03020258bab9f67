//! Error types shared across the library

use thiserror::Error;

/// Failures talking to the control plane
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Neither in-cluster nor kubeconfig credentials could be loaded
    #[error("could not load Kubernetes configuration: {0}")]
    Configuration(String),

    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Failure of a single scan rule
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cluster read failed: {0}")]
    Cluster(#[from] ClusterError),

    #[error("rule panicked or was cancelled: {0}")]
    Aborted(String),

    #[error("{0}")]
    Rule(String),
}

/// Persistence sink failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("issue store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("issue store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
