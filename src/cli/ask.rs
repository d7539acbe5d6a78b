//! Menu-less "ask" command

use std::error::Error;
use std::sync::Arc;

use crate::cli::connect::{build_backend, ConnectedServer};
use crate::core::config::Config;
use crate::core::query::QueryEngine;
use crate::ui::operator::{Operator, TerminalOperator};
use crate::utils::logging::LoggingState;

pub async fn run_ask(
    config: &Config,
    query: Vec<String>,
    log: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let query = query.join(" ");
    if query.trim().is_empty() {
        eprintln!("Usage: relais ask <query>");
        std::process::exit(1);
    }

    let transcript = LoggingState::new(log)?;
    transcript.log_message(&format!("Query: {query}"))?;
    let operator = Arc::new(TerminalOperator::new(transcript));
    let backend = build_backend(config)?;
    let server = ConnectedServer::start(config, backend.clone(), operator.clone()).await?;

    let engine = QueryEngine::new(
        backend,
        server.peer(),
        config.backend.model(),
        config.query.max_steps(),
    );
    let output = engine.query(&query, server.registry().tools()).await;
    server.shutdown().await;

    operator.show(&output);
    Ok(())
}
