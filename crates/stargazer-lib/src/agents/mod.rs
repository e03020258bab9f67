//! Command router over a closed set of troubleshooting agents
//!
//! Input grammar:
//! - `@name` switches the current agent
//! - `@name rest` runs `rest` on `name` without switching
//! - `/agents`, `/help` print introspection text
//! - `!raw` checks a kubectl command with the validator and echoes it
//! - anything else goes to the current agent
//!
//! Every outcome, including user mistakes, is a response string.

mod units;


use crate::cluster::Scope;
use crate::scan::Scanner;
use crate::validator::validate_kubectl_command;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const HELP_TEXT: &str = "Stargazer Commands:
  /agents - List available agents
  /help - Show this help
  @agentname - Switch to specific agent
  @agentname command - Execute command on specific agent
  !kubectl command - Validate a read-only kubectl command";

/// The built-in agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Troubleshooter,
    Discovery,
    Logs,
    Resource,
    Network,
    Security,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Troubleshooter,
        AgentKind::Discovery,
        AgentKind::Logs,
        AgentKind::Resource,
        AgentKind::Network,
        AgentKind::Security,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Troubleshooter => "troubleshooter",
            AgentKind::Discovery => "discovery",
            AgentKind::Logs => "logs",
            AgentKind::Resource => "resource",
            AgentKind::Network => "network",
            AgentKind::Security => "security",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::Troubleshooter => "Main agent for Kubernetes troubleshooting",
            AgentKind::Discovery => "Discovers and analyzes cluster resources",
            AgentKind::Logs => "Retrieves and analyzes pod logs",
            AgentKind::Resource => "Analyzes resource usage and constraints",
            AgentKind::Network => "Analyzes network connectivity and policies",
            AgentKind::Security => "Analyzes security configurations and compliance",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared read access handed to every agent
pub(crate) struct AgentContext<'a> {
    pub scanner: &'a Scanner,
    pub scope: &'a Scope,
}

impl AgentContext<'_> {
    /// Namespace for single-object commands: the explicit scope, else the client default
    pub fn namespace(&self) -> &str {
        self.scope
            .as_namespace()
            .unwrap_or_else(|| self.scanner.client().default_namespace())
    }
}

/// Stateful dispatcher; one command at a time
pub struct AgentRouter {
    scanner: Arc<Scanner>,
    scope: Scope,
    current: AgentKind,
}

impl AgentRouter {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            scanner,
            scope: Scope::Cluster,
            current: AgentKind::Troubleshooter,
        }
    }

    /// Restrict every agent read to `scope`
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn current_agent(&self) -> AgentKind {
        self.current
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub async fn execute_command(&mut self, input: &str) -> String {
        let input = input.trim();

        if let Some(mention) = input.strip_prefix('@') {
            let (name, query) = match mention.split_once(char::is_whitespace) {
                Some((name, query)) => (name, query.trim()),
                None => (mention, ""),
            };
            let Some(kind) = AgentKind::parse(name) else {
                return format!("Unknown agent: {}", name);
            };
            if query.is_empty() {
                self.current = kind;
                debug!(agent = kind.name(), "Switched agent");
                return format!("Switched to {} agent", kind);
            }
            return self.dispatch(kind, query).await;
        }

        if input.starts_with('/') {
            return match input {
                "/agents" => self.list_agents(),
                "/help" => HELP_TEXT.to_string(),
                _ => format!("Unknown command: {}", input),
            };
        }

        if let Some(raw) = input.strip_prefix('!') {
            return check_raw_command(raw);
        }

        self.dispatch(self.current, input).await
    }

    /// Run `query` on `agent` without touching the current agent
    pub async fn dispatch(&self, agent: AgentKind, query: &str) -> String {
        debug!(agent = agent.name(), query = %query, "Dispatching agent command");
        let ctx = AgentContext {
            scanner: &self.scanner,
            scope: &self.scope,
        };

        match agent {
            AgentKind::Troubleshooter => units::troubleshooter(&ctx, query).await,
            AgentKind::Discovery => units::discovery(&ctx, query).await,
            AgentKind::Logs => units::logs(&ctx, query).await,
            AgentKind::Resource => units::resource(&ctx, query).await,
            AgentKind::Network => units::network(&ctx, query).await,
            AgentKind::Security => units::security(&ctx, query).await,
        }
    }

    fn list_agents(&self) -> String {
        let mut response = String::from("Available agents:\n");
        for kind in AgentKind::ALL {
            let marker = if kind == self.current { " (current)" } else { "" };
            response.push_str(&format!(
                "• @{}{} - {}\n",
                kind.name(),
                marker,
                kind.description()
            ));
        }
        response
    }
}

fn check_raw_command(raw: &str) -> String {
    let mut tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.first() == Some(&"kubectl") {
        tokens.remove(0);
    }
    let command = tokens.join(" ");

    match validate_kubectl_command(&command) {
        Ok(()) => format!("Run: kubectl {}", command),
        Err(reason) => format!("Command rejected: {}", reason),
    }
}
