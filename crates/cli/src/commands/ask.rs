//! Agent conversation commands

use super::Session;
use crate::output::print_json;
use crate::output::OutputFormat;
use anyhow::Result;
use colored::Colorize;
use stargazer_lib::AgentRouter;
use std::io::{self, BufRead, Write};

/// One query, or an interactive prompt when `query` is empty
pub async fn ask(session: &Session, query: &str) -> Result<()> {
    let mut router = AgentRouter::new(session.scanner.clone()).with_scope(session.scope(None));

    if !query.trim().is_empty() {
        return respond(&mut router, query, session.format).await;
    }

    println!("{}", "Stargazer Troubleshooter (type 'exit' to quit)".bold());
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("@{}> ", router.current_agent().name().cyan());
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let command = line.trim();
        if command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit") {
            break;
        }
        if command.is_empty() {
            continue;
        }

        println!("{}", router.execute_command(command).await);
    }

    Ok(())
}

/// Run a single router command
pub async fn exec(session: &Session, query: &str) -> Result<()> {
    let mut router = AgentRouter::new(session.scanner.clone()).with_scope(session.scope(None));
    respond(&mut router, query, session.format).await
}

async fn respond(router: &mut AgentRouter, query: &str, format: OutputFormat) -> Result<()> {
    let response = router.execute_command(query).await;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "agent": router.current_agent().name(),
            "query": query,
            "response": response,
        })),
        OutputFormat::Table => {
            println!("{}", response);
            Ok(())
        }
    }
}
