//! Control-plane reads through kube-rs

use super::{async_trait, ClusterSource, Scope};
use crate::error::ClusterError;
use crate::models::{format_age, ContainerWaiting, DeploymentRecord, EventRecord, PodRecord};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config, Resource};
use std::path::Path;
use tracing::{debug, info};

/// `ClusterSource` backed by a kube-rs client
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    /// Resolve credentials: in-cluster service account first, then kubeconfig
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, ClusterError> {
        let config = match Config::incluster() {
            Ok(config) => {
                info!("Using in-cluster service account credentials");
                config
            }
            Err(in_cluster) => {
                debug!(error = %in_cluster, "In-cluster config unavailable, trying kubeconfig");
                let config = Self::load_kubeconfig(kubeconfig).await.map_err(|e| {
                    ClusterError::Configuration(format!(
                        "in-cluster: {}; kubeconfig: {}",
                        in_cluster, e
                    ))
                })?;
                info!(cluster_url = %config.cluster_url, "Using kubeconfig credentials");
                config
            }
        };

        let client =
            Client::try_from(config).map_err(|e| ClusterError::Configuration(e.to_string()))?;
        Ok(Self { client })
    }

    async fn load_kubeconfig(path: Option<&Path>) -> Result<Config, KubeconfigError> {
        let options = KubeConfigOptions::default();
        match path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await
            }
            // $KUBECONFIG (possibly a path list), else ~/.kube/config
            None => Config::from_kubeconfig(&options).await,
        }
    }

    fn api<K>(&self, scope: &Scope) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match scope {
            Scope::Cluster => Api::all(self.client.clone()),
            Scope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
        }
    }
}

#[async_trait]
impl ClusterSource for KubeSource {
    async fn list_pods(&self, scope: &Scope) -> Result<Vec<PodRecord>, ClusterError> {
        let list = self.api::<Pod>(scope).list(&ListParams::default()).await?;
        let now = Utc::now();
        Ok(list.items.iter().map(|p| pod_record(p, now)).collect())
    }

    async fn list_deployments(&self, scope: &Scope) -> Result<Vec<DeploymentRecord>, ClusterError> {
        let list = self
            .api::<Deployment>(scope)
            .list(&ListParams::default())
            .await?;
        let now = Utc::now();
        Ok(list.items.iter().map(|d| deployment_record(d, now)).collect())
    }

    async fn list_events(&self, scope: &Scope) -> Result<Vec<EventRecord>, ClusterError> {
        let params = ListParams::default().fields("type!=Normal");
        let list = self.api::<Event>(scope).list(&params).await?;
        let now = Utc::now();
        Ok(list
            .items
            .iter()
            .map(|e| event_record(e, now))
            .filter(|e| e.event_type != "Normal")
            .collect())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        lines: i64,
    ) -> Result<String, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(lines),
            ..LogParams::default()
        };
        Ok(api.logs(name, &params).await?)
    }
}

pub(crate) fn pod_record(pod: &Pod, now: DateTime<Utc>) -> PodRecord {
    let meta = &pod.metadata;
    let status = pod.status.as_ref();
    let containers = status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default();

    let waiting = containers
        .iter()
        .filter_map(|cs| {
            let waiting = cs.state.as_ref()?.waiting.as_ref()?;
            Some(ContainerWaiting {
                container: cs.name.clone(),
                reason: waiting.reason.clone().unwrap_or_default(),
                message: waiting.message.clone().unwrap_or_default(),
            })
        })
        .filter(|w| !w.reason.is_empty())
        .collect();

    PodRecord {
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        status: status
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        ready: !containers.is_empty() && containers.iter().all(|cs| cs.ready),
        restarts: containers
            .iter()
            .map(|cs| cs.restart_count.max(0) as u32)
            .sum(),
        age: format_age(meta.creation_timestamp.as_ref().map(|t| t.0), now),
        labels: meta.labels.clone().unwrap_or_default(),
        waiting,
    }
}

pub(crate) fn deployment_record(deployment: &Deployment, now: DateTime<Utc>) -> DeploymentRecord {
    let meta = &deployment.metadata;
    let status = deployment.status.as_ref();

    DeploymentRecord {
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        replicas: deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1),
        ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        available: status.and_then(|s| s.available_replicas).unwrap_or(0),
        up_to_date: status.and_then(|s| s.updated_replicas).unwrap_or(0),
        age: format_age(meta.creation_timestamp.as_ref().map(|t| t.0), now),
        labels: meta.labels.clone().unwrap_or_default(),
    }
}

pub(crate) fn event_record(event: &Event, now: DateTime<Utc>) -> EventRecord {
    let timestamp = event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.first_timestamp.as_ref().map(|t| t.0));
    let first_seen = event.first_timestamp.as_ref().map(|t| t.0).or(timestamp);

    EventRecord {
        namespace: event.metadata.namespace.clone().unwrap_or_default(),
        event_type: event.type_.clone().unwrap_or_default(),
        reason: event.reason.clone().unwrap_or_default(),
        message: event.message.clone().unwrap_or_default(),
        object_kind: event.involved_object.kind.clone().unwrap_or_default(),
        object_name: event.involved_object.name.clone().unwrap_or_default(),
        timestamp,
        age: format_age(first_seen, now),
    }
}
