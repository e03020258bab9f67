//! Stargazer CLI
//!
//! A command-line tool for scanning a Kubernetes cluster for issues,
//! summarizing its health, tailing pod logs and talking to the
//! troubleshooting agents.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ask, scan, Session};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Stargazer - Lightweight Kubernetes Troubleshooting Tool
#[derive(Parser)]
#[command(name = "stargazer")]
#[command(
    author,
    version,
    about = "Stargazer - Lightweight Kubernetes Troubleshooting Tool",
    long_about = None
)]
pub struct Cli {
    /// Path to a kubeconfig file (default: in-cluster config, then $KUBECONFIG or ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Output format (defaults to the config file value, else table)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the cluster for issues
    Scan {
        /// Namespace to scan ("all" or omitted scans every namespace)
        #[arg(long, short)]
        namespace: Option<String>,

        /// Keep scanning until interrupted
        #[arg(long, short)]
        continuous: bool,

        /// Seconds between scans in continuous mode
        #[arg(long, short, default_value_t = 2)]
        interval: u64,

        /// Append detected issues to this JSON store
        #[arg(long, env = "STARGAZER_STORAGE_PATH")]
        store: Option<PathBuf>,
    },

    /// Show the cluster health summary
    Health {
        /// Namespace to check ("all" or omitted checks every namespace)
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Show the last lines of a pod's log
    Logs {
        /// Pod name
        pod: String,

        /// Number of log lines to fetch
        #[arg(long, short, default_value_t = 50)]
        lines: i64,

        /// Pod namespace (defaults to the current namespace)
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Ask the troubleshooting agents; interactive when no query is given
    Ask {
        /// Query or router command, e.g. "scan" or "@logs get web-1"
        #[arg(default_value = "")]
        query: String,
    },

    /// Execute a single agent command
    Exec {
        /// Router command, e.g. "@discovery pods" or "!get pods"
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = config::Config::load()?;
    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(output::OutputFormat::from_config)
        })
        .unwrap_or_default();

    let session = match Session::connect(cli.kubeconfig.as_deref(), format, config).await {
        Ok(session) => session,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Scan {
            namespace,
            continuous,
            interval,
            store,
        } => {
            scan::scan(
                &session,
                namespace.as_deref(),
                continuous,
                Duration::from_secs(interval.max(1)),
                store.as_deref(),
            )
            .await?;
        }
        Commands::Health { namespace } => {
            scan::health(&session, namespace.as_deref()).await?;
        }
        Commands::Logs {
            pod,
            lines,
            namespace,
        } => {
            scan::logs(&session, &pod, lines, namespace.as_deref()).await?;
        }
        Commands::Ask { query } => {
            ask::ask(&session, &query).await?;
        }
        Commands::Exec { query } => {
            ask::exec(&session, &query).await?;
        }
    }

    Ok(())
}
