//! CLI subcommand implementations

pub mod ask;
pub mod scan;

use crate::config::Config;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use stargazer_lib::{cluster::DEFAULT_CACHE_TTL, ClusterClient, Scanner, Scope};
use std::path::Path;
use std::sync::Arc;

/// Everything a subcommand needs: one shared client behind one scanner
pub struct Session {
    pub scanner: Arc<Scanner>,
    pub format: OutputFormat,
    pub config: Config,
}

impl Session {
    /// Build the cluster client; failing to find credentials is fatal
    pub async fn connect(
        kubeconfig: Option<&Path>,
        format: OutputFormat,
        config: Config,
    ) -> Result<Self> {
        let client = ClusterClient::connect(kubeconfig, DEFAULT_CACHE_TTL)
            .await
            .context("Cannot configure cluster access")?;

        Ok(Self {
            scanner: Arc::new(Scanner::new(Arc::new(client))),
            format,
            config,
        })
    }

    /// Effective scope for a `-n` argument
    pub fn scope(&self, namespace: Option<&str>) -> Scope {
        Scope::from_arg(self.config.namespace(namespace))
    }
}
