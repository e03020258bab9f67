//! Daemon configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use stargazer_lib::cluster::Scope;
use std::path::PathBuf;
use std::time::Duration;

/// Environment prefix, e.g. `STARGAZER_API_PORT`
pub const ENV_PREFIX: &str = "STARGAZER";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Namespace to scan; unset, empty or `all` scans the whole cluster
    #[serde(default)]
    pub namespace: Option<String>,

    /// API server port for health/metrics/issues
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between scan cycles
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Issue store location
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Number of issues retained by the store
    #[serde(default = "default_max_stored_issues")]
    pub max_stored_issues: usize,

    /// Cluster cache TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Explicit kubeconfig, used only outside the cluster
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

fn default_api_port() -> u16 {
    8080
}

fn default_scan_interval() -> u64 {
    30
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(stargazer_lib::storage::DEFAULT_STORAGE_PATH)
}

fn default_max_stored_issues() -> usize {
    stargazer_lib::storage::DEFAULT_MAX_ENTRIES
}

fn default_cache_ttl() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            api_port: default_api_port(),
            scan_interval_secs: default_scan_interval(),
            storage_path: default_storage_path(),
            max_stored_issues: default_max_stored_issues(),
            cache_ttl_secs: default_cache_ttl(),
            kubeconfig: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from `STARGAZER_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_environment(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()?;

        config
            .try_deserialize()
            .context("Invalid STARGAZER_* configuration")
    }

    pub fn scope(&self) -> Scope {
        Scope::from_arg(self.namespace.as_deref())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
