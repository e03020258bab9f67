//! Core data models for the scanner
//!
//! `Issue` is the canonical finding handed to consumers and the persistence
//! sink. The `*Record` types are transient views derived from control-plane
//! objects and are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Warning,
    Info,
}

impl Priority {
    /// Lowercase wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::Warning => "warning",
            Priority::Info => "info",
        }
    }

    /// Sort rank, most severe first
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::Warning => 1,
            Priority::Info => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Deterministic id for a finding.
///
/// First 8 bytes of SHA-256 over `"{resource_name}-{issue_type}"`, hex encoded.
/// Re-detecting the same condition in a later cycle yields the same id.
pub fn generate_issue_id(resource_name: &str, issue_type: &str) -> String {
    let digest = Sha256::digest(format!("{}-{}", resource_name, issue_type).as_bytes());
    hex::encode(&digest[..8])
}

/// A detected problem in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    id: String,
    title: String,
    description: String,
    priority: Priority,
    resource_type: String,
    resource_name: String,
    namespace: String,
    timestamp: DateTime<Utc>,
}

impl Issue {
    /// Build an issue stamped with the current instant
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            priority,
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            namespace: namespace.into(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the detection timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Waiting state of a single container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerWaiting {
    pub container: String,
    pub reason: String,
    pub message: String,
}

/// Pod view derived from the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub node: Option<String>,
    /// AND over every container's ready flag, false when no statuses exist
    pub ready: bool,
    /// Sum of container restart counts
    pub restarts: u32,
    pub age: String,
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub waiting: Vec<ContainerWaiting>,
}

impl PodRecord {
    pub fn is_healthy(&self) -> bool {
        self.status == "Running" && self.ready
    }
}

/// Deployment view derived from the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    pub ready: i32,
    pub available: i32,
    pub up_to_date: i32,
    pub age: String,
    pub labels: BTreeMap<String, String>,
}

impl DeploymentRecord {
    pub fn is_healthy(&self) -> bool {
        self.ready == self.replicas
    }
}

/// Non-Normal event view derived from the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub namespace: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub object_kind: String,
    pub object_name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub age: String,
}

impl EventRecord {
    pub fn is_warning(&self) -> bool {
        self.event_type == "Warning"
    }

    pub fn is_error(&self) -> bool {
        self.reason.contains("Error") || self.reason.contains("Fail")
    }
}

/// Render an elapsed duration in its largest whole unit
pub fn format_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "Unknown".to_string();
    };

    let secs = (now - created).num_seconds().max(0);
    if secs >= 86_400 {
        format!("{}d", secs / 86_400)
    } else if secs > 3600 {
        format!("{}h", secs / 3600)
    } else if secs > 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
