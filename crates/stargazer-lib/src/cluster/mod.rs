//! Cached read access to cluster state
//!
//! `ClusterSource` performs live reads against the control plane.
//! `ClusterClient` wraps one shared source with a TTL cache and a fail-open
//! policy: a failed live read is logged and degrades to an empty result.

mod cache;
mod kube_source;


pub use cache::DEFAULT_CACHE_TTL;
pub use kube_source::KubeSource;

use crate::error::ClusterError;
use crate::models::{DeploymentRecord, EventRecord, PodRecord};
use crate::observability::ScannerMetrics;
use cache::ResourceCache;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use async_trait::async_trait;

/// Environment variable overriding the default namespace
pub const NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// Namespace file mounted with the service account token
pub const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Namespace filter for a read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every namespace
    Cluster,
    /// A single namespace, exactly as supplied
    Namespace(String),
}

impl Scope {
    pub fn namespace(ns: impl Into<String>) -> Self {
        Scope::Namespace(ns.into())
    }

    /// Normalize a user-supplied namespace argument.
    ///
    /// `None`, `""` and `"all"` mean cluster-wide; anything else is an
    /// explicit namespace filter.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("") | Some("all") => Scope::Cluster,
            Some(ns) => Scope::Namespace(ns.to_string()),
        }
    }

    /// Namespace filter, `None` when cluster-wide
    pub fn as_namespace(&self) -> Option<&str> {
        match self {
            Scope::Cluster => None,
            Scope::Namespace(ns) => Some(ns),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Cluster => f.write_str("all namespaces"),
            Scope::Namespace(ns) => write!(f, "namespace {}", ns),
        }
    }
}

/// Kinds of cached resource lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pods,
    Deployments,
    Events,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Pods,
        ResourceKind::Deployments,
        ResourceKind::Events,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pods => "pods",
            ResourceKind::Deployments => "deployments",
            ResourceKind::Events => "events",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource kind whose most recent live read failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadFailure {
    pub kind: ResourceKind,
    pub error: String,
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

/// Live, uncached reads against the control plane
#[async_trait]
pub trait ClusterSource: Send + Sync {
    async fn list_pods(&self, scope: &Scope) -> Result<Vec<PodRecord>, ClusterError>;

    async fn list_deployments(&self, scope: &Scope) -> Result<Vec<DeploymentRecord>, ClusterError>;

    /// Events whose type is not `Normal`
    async fn list_events(&self, scope: &Scope) -> Result<Vec<EventRecord>, ClusterError>;

    /// Last `lines` lines of a pod's log
    async fn pod_logs(&self, namespace: &str, name: &str, lines: i64)
        -> Result<String, ClusterError>;
}

/// Default namespace: env override, then the service account file, then `default`
pub fn resolve_namespace() -> String {
    resolve_namespace_from(
        std::env::var(NAMESPACE_ENV).ok(),
        Path::new(SERVICE_ACCOUNT_NAMESPACE_PATH),
    )
}

pub(crate) fn resolve_namespace_from(env_value: Option<String>, sa_file: &Path) -> String {
    if let Some(ns) = env_value.filter(|ns| !ns.trim().is_empty()) {
        return ns.trim().to_string();
    }

    std::fs::read_to_string(sa_file)
        .ok()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// Shared, cached cluster reader
pub struct ClusterClient {
    source: Arc<dyn ClusterSource>,
    namespace: String,
    pods: ResourceCache<PodRecord>,
    deployments: ResourceCache<DeploymentRecord>,
    events: ResourceCache<EventRecord>,
    failed_reads: DashMap<ResourceKind, String>,
    metrics: ScannerMetrics,
}

impl ClusterClient {
    /// Wrap a source with the default TTL
    pub fn new(source: Arc<dyn ClusterSource>, namespace: impl Into<String>) -> Self {
        Self::with_ttl(source, namespace, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(
        source: Arc<dyn ClusterSource>,
        namespace: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            namespace: namespace.into(),
            pods: ResourceCache::new(ttl),
            deployments: ResourceCache::new(ttl),
            events: ResourceCache::new(ttl),
            failed_reads: DashMap::new(),
            metrics: ScannerMetrics::new(),
        }
    }

    /// Connect to the cluster and resolve the default namespace.
    ///
    /// Fails only when no credentials can be loaded.
    pub async fn connect(kubeconfig: Option<&Path>, ttl: Duration) -> Result<Self, ClusterError> {
        let source = KubeSource::connect(kubeconfig).await?;
        Ok(Self::with_ttl(Arc::new(source), resolve_namespace(), ttl))
    }

    /// Namespace used for log reads
    pub fn default_namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get_pods(&self, scope: &Scope) -> Vec<PodRecord> {
        self.read_through(ResourceKind::Pods, &self.pods, scope, || {
            self.source.list_pods(scope)
        })
        .await
    }

    pub async fn get_deployments(&self, scope: &Scope) -> Vec<DeploymentRecord> {
        self.read_through(ResourceKind::Deployments, &self.deployments, scope, || {
            self.source.list_deployments(scope)
        })
        .await
    }

    pub async fn get_events(&self, scope: &Scope) -> Vec<EventRecord> {
        self.read_through(ResourceKind::Events, &self.events, scope, || {
            self.source.list_events(scope)
        })
        .await
    }

    /// Tail a pod's log in the default namespace; never cached, never fails
    pub async fn get_pod_logs(&self, name: &str, lines: i64) -> String {
        self.get_pod_logs_in(&self.namespace, name, lines).await
    }

    pub async fn get_pod_logs_in(&self, namespace: &str, name: &str, lines: i64) -> String {
        match self.source.pod_logs(namespace, name, lines).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(pod = %name, namespace = %namespace, error = %e, "Failed to read pod logs");
                format!("Error getting logs: {}", e)
            }
        }
    }

    /// Kinds whose latest live read failed, in kind order.
    ///
    /// A successful live read of a kind clears its entry. Cache hits leave
    /// it untouched since failures are never cached.
    pub fn failed_reads(&self) -> Vec<ReadFailure> {
        let mut failures: Vec<ReadFailure> = self
            .failed_reads
            .iter()
            .map(|entry| ReadFailure {
                kind: *entry.key(),
                error: entry.value().clone(),
            })
            .collect();
        failures.sort_by_key(|f| f.kind);
        failures
    }

    /// Drop every cached entry
    pub fn clear_cache(&self) {
        self.pods.clear();
        self.deployments.clear();
        self.events.clear();
        debug!("Cluster cache cleared");
    }

    async fn read_through<T, F, Fut>(
        &self,
        kind: ResourceKind,
        cache: &ResourceCache<T>,
        scope: &Scope,
        fetch: F,
    ) -> Vec<T>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, ClusterError>>,
    {
        if let Some(hit) = cache.get(scope) {
            self.metrics.inc_cache_hit(kind.as_str());
            return hit;
        }
        self.metrics.inc_cache_miss(kind.as_str());

        match fetch().await {
            Ok(items) => {
                debug!(kind = %kind, scope = %scope, count = items.len(), "Live read complete");
                cache.insert(scope.clone(), items.clone());
                self.failed_reads.remove(&kind);
                items
            }
            Err(e) => {
                self.metrics.inc_live_read_errors(kind.as_str());
                warn!(
                    kind = %kind,
                    scope = %scope,
                    error = %e,
                    "Live read failed, returning empty list"
                );
                self.failed_reads.insert(kind, e.to_string());
                Vec::new()
            }
        }
    }
}
