//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, resolves the effective
//! configuration, and runs the selected command.

pub mod ask;
pub mod connect;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::cli::ask::run_ask;
use crate::cli::connect::{build_backend, ConnectedServer};
use crate::core::config::data::path_display;
use crate::core::config::Config;
use crate::core::query::QueryEngine;
use crate::core::session::Session;
use crate::ui::operator::TerminalOperator;
use crate::utils::logging::{init_tracing, LoggingState};

#[derive(Parser)]
#[command(name = "relais")]
#[command(about = "An interactive terminal client for MCP servers")]
#[command(
    long_about = "Relais starts an MCP server as a child process, discovers its tools, \
prompts, and resources, and lets you use them from a numbered menu. Free-text queries \
go to an OpenAI-compatible model that may call the server's tools, and sampling requests \
from the server are answered with the same model after you confirm each message.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    API key for the default backend (see backend.api_key_env)\n\
  RELAIS_LOG        Diagnostic log filter, e.g. \"relais=debug\" (default: warn)\n\n\
Examples:\n\
  relais --server \"node build/index.js\"\n\
  relais --server \"node build/index.js\" ask create a user named Ann\n\
  relais config init"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model for queries (overrides backend.model)
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Chat completions base URL (overrides backend.base_url)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Server command line, split on whitespace (overrides [server])
    #[arg(short = 's', long, global = true, value_name = "COMMAND")]
    pub server: Option<String>,

    /// Append everything shown in the session to a transcript file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,

    /// Write diagnostic logs to a file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub debug_log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive menu (default)
    Chat,
    /// Answer a single query with the model and the server's tools
    Ask {
        /// Query text (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Print the server's tools, prompts, resources, and templates
    List,
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a starter configuration file if none exists
    Init,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.debug_log.as_deref())?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load_from_path(&config_path)?;
    apply_overrides(&mut config, &args);

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config, args.log).await,
        Commands::Ask { query } => run_ask(&config, query, args.log).await,
        Commands::List => run_list(&config, args.log).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("Configuration file: {}", path_display(&config_path));
                config.print_all();
                Ok(())
            }
            ConfigCommands::Init => {
                if config_path.exists() {
                    println!(
                        "Configuration already exists at {}",
                        path_display(&config_path)
                    );
                    return Ok(());
                }
                Config::starter().save_to_path(&config_path)?;
                println!("✅ Wrote {}", path_display(&config_path));
                Ok(())
            }
        },
    }
}

/// Command-line flags win over the configuration file.
pub fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(model) = &args.model {
        config.backend.model = Some(model.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.backend.base_url = Some(base_url.clone());
    }
    if let Some(server) = &args.server {
        config.set_server_command_line(server);
    }
}

async fn run_chat(config: &Config, log: Option<String>) -> Result<(), Box<dyn Error>> {
    let transcript = LoggingState::new(log)?;
    let transcript_status = transcript.get_status_string();
    let operator = Arc::new(TerminalOperator::new(transcript));
    let backend = build_backend(config)?;

    let server = ConnectedServer::start(config, backend.clone(), operator.clone()).await?;
    let details = server.client().server_details();
    println!(
        "Connected to {} {} (transcript {transcript_status})",
        details.server_info.name, details.server_info.version
    );

    let engine = QueryEngine::new(
        backend,
        server.peer(),
        config.backend.model(),
        config.query.max_steps(),
    );
    let session = Session::new(
        server.peer(),
        server.registry(),
        operator,
        server.bridge(),
        engine,
    );
    let outcome = session.run().await;
    server.shutdown().await;
    outcome?;
    Ok(())
}

async fn run_list(config: &Config, log: Option<String>) -> Result<(), Box<dyn Error>> {
    let operator = Arc::new(TerminalOperator::new(LoggingState::new(log)?));
    let backend = build_backend(config)?;
    let server = ConnectedServer::start(config, backend, operator).await?;
    println!("{}", server.registry().render());
    server.shutdown().await;
    Ok(())
}
