//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use stargazer_lib::{models::Issue, scan::ResourceHealth, Priority};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a config-file value, ignoring unknown names
    pub fn from_config(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Row for the issues table
#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print issues grouped by priority, most severe first
pub fn print_issues(issues: &[Issue], format: OutputFormat) -> anyhow::Result<()> {
    let mut sorted: Vec<&Issue> = issues.iter().collect();
    sorted.sort_by_key(|i| i.priority().rank());

    match format {
        OutputFormat::Json => print_json(&sorted),
        OutputFormat::Table => {
            if sorted.is_empty() {
                print_success("No issues detected in the cluster");
                return Ok(());
            }

            print_warning(&format!("Found {} issues:", sorted.len()));
            let rows: Vec<IssueRow> = sorted
                .iter()
                .map(|i| IssueRow {
                    priority: color_priority(i.priority()),
                    title: i.title().to_string(),
                    resource: format!("{}/{}", i.resource_type(), i.resource_name()),
                    namespace: i.namespace().to_string(),
                })
                .collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);

            for issue in sorted.iter().filter(|i| i.priority() == Priority::Critical).take(5) {
                println!("\n{} {}", color_priority(issue.priority()), issue.title().bold());
                println!("  {}", issue.description());
            }
            Ok(())
        }
    }
}

/// Print the cluster health summary
pub fn print_health(
    health: &ResourceHealth,
    narrative: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(health),
        OutputFormat::Table => {
            println!("{}", "Cluster Health Summary".bold());
            println!("{}", "=".repeat(40));
            println!("  Pods:           {}/{} healthy", health.pods.healthy, health.pods.total);
            println!(
                "  Deployments:    {}/{} healthy",
                health.deployments.healthy, health.deployments.total
            );
            println!("  Warning Events: {}", health.events.warnings);
            println!("  Error Events:   {}", health.events.errors);
            println!();
            println!(
                "Overall Status: {}",
                color_status(&health.overall_health.as_str().to_uppercase())
            );
            print_info(narrative);
            Ok(())
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a priority tag
pub fn color_priority(priority: Priority) -> String {
    let label = priority.to_string();
    match priority {
        Priority::Critical => label.red().bold().to_string(),
        Priority::Warning => label.yellow().to_string(),
        Priority::Info => label.blue().to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "running" => status.green().to_string(),
        "degraded" | "warning" | "pending" => status.yellow().to_string(),
        "unhealthy" | "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_config() {
        assert_eq!(OutputFormat::from_config("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_config("table"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_config("yaml"), None);
    }

    #[test]
    fn test_color_priority_keeps_label() {
        colored::control::set_override(false);
        assert_eq!(color_priority(Priority::Critical), "CRITICAL");
        assert_eq!(color_status("degraded"), "degraded");
    }
}
