//! In-memory cluster source and record builders for unit tests

use crate::cluster::{async_trait, ClusterClient, ClusterSource, Scope};
use crate::error::ClusterError;
use crate::models::{DeploymentRecord, EventRecord, PodRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fake control plane with call counters and switchable failures
#[derive(Default)]
pub(crate) struct FakeSource {
    pub pods: Mutex<Vec<PodRecord>>,
    pub deployments: Mutex<Vec<DeploymentRecord>>,
    pub events: Mutex<Vec<EventRecord>>,
    pub logs: Mutex<Option<String>>,
    pub fail_pods: AtomicBool,
    pub fail_deployments: AtomicBool,
    pub fail_events: AtomicBool,
    pub pod_calls: AtomicUsize,
    pub deployment_calls: AtomicUsize,
    pub event_calls: AtomicUsize,
    pub log_calls: AtomicUsize,
    pub scopes: Mutex<Vec<Scope>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pods(self, pods: Vec<PodRecord>) -> Self {
        *self.pods.lock().unwrap() = pods;
        self
    }

    pub fn with_deployments(self, deployments: Vec<DeploymentRecord>) -> Self {
        *self.deployments.lock().unwrap() = deployments;
        self
    }

    pub fn with_events(self, events: Vec<EventRecord>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }

    pub fn with_logs(self, logs: &str) -> Self {
        *self.logs.lock().unwrap() = Some(logs.to_string());
        self
    }

    pub fn into_client(self) -> (Arc<Self>, Arc<ClusterClient>) {
        let source = Arc::new(self);
        let client = Arc::new(ClusterClient::new(source.clone(), "default"));
        (source, client)
    }

    fn record_scope(&self, scope: &Scope) {
        self.scopes.lock().unwrap().push(scope.clone());
    }

    fn in_scope(scope: &Scope, namespace: &str) -> bool {
        scope.as_namespace().map_or(true, |ns| ns == namespace)
    }
}

#[async_trait]
impl ClusterSource for FakeSource {
    async fn list_pods(&self, scope: &Scope) -> Result<Vec<PodRecord>, ClusterError> {
        self.pod_calls.fetch_add(1, Ordering::SeqCst);
        self.record_scope(scope);
        if self.fail_pods.load(Ordering::SeqCst) {
            return Err(ClusterError::Unavailable("pods unavailable".into()));
        }
        let pods = self.pods.lock().unwrap();
        Ok(pods
            .iter()
            .filter(|p| Self::in_scope(scope, &p.namespace))
            .cloned()
            .collect())
    }

    async fn list_deployments(&self, scope: &Scope) -> Result<Vec<DeploymentRecord>, ClusterError> {
        self.deployment_calls.fetch_add(1, Ordering::SeqCst);
        self.record_scope(scope);
        if self.fail_deployments.load(Ordering::SeqCst) {
            return Err(ClusterError::Unavailable("deployments unavailable".into()));
        }
        let deployments = self.deployments.lock().unwrap();
        Ok(deployments
            .iter()
            .filter(|d| Self::in_scope(scope, &d.namespace))
            .cloned()
            .collect())
    }

    async fn list_events(&self, scope: &Scope) -> Result<Vec<EventRecord>, ClusterError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        self.record_scope(scope);
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(ClusterError::Unavailable("events unavailable".into()));
        }
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| Self::in_scope(scope, &e.namespace))
            .cloned()
            .collect())
    }

    async fn pod_logs(
        &self,
        _namespace: &str,
        name: &str,
        lines: i64,
    ) -> Result<String, ClusterError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        match self.logs.lock().unwrap().as_ref() {
            Some(logs) => {
                let all: Vec<&str> = logs.lines().collect();
                let start = all.len().saturating_sub(lines.max(0) as usize);
                Ok(all[start..].join("\n"))
            }
            None => Err(ClusterError::Unavailable(format!("pod {} not found", name))),
        }
    }
}

pub(crate) fn pod(
    name: &str,
    namespace: &str,
    status: &str,
    ready: bool,
    restarts: u32,
) -> PodRecord {
    PodRecord {
        name: name.to_string(),
        namespace: namespace.to_string(),
        status: status.to_string(),
        node: Some("node-1".to_string()),
        ready,
        restarts,
        age: "1h".to_string(),
        labels: BTreeMap::new(),
        waiting: Vec::new(),
    }
}

pub(crate) fn deployment(
    name: &str,
    namespace: &str,
    replicas: i32,
    ready: i32,
    available: i32,
) -> DeploymentRecord {
    DeploymentRecord {
        name: name.to_string(),
        namespace: namespace.to_string(),
        replicas,
        ready,
        available,
        up_to_date: ready,
        age: "2d".to_string(),
        labels: BTreeMap::new(),
    }
}

pub(crate) fn event(
    namespace: &str,
    event_type: &str,
    reason: &str,
    message: &str,
    object: (&str, &str),
    timestamp: Option<DateTime<Utc>>,
) -> EventRecord {
    EventRecord {
        namespace: namespace.to_string(),
        event_type: event_type.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        object_kind: object.0.to_string(),
        object_name: object.1.to_string(),
        timestamp,
        age: "5m".to_string(),
    }
}
