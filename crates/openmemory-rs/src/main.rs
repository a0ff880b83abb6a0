//! `openmemory` binary: MCP server plus a few inspection commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, info};
use openmemory_rs::server::MemoryMcpServer;
use openmemory_rs::{build_service, init_logging, load_config};
use serde_json::Value;
use std::path::PathBuf;

/// Command-line options for the memory server.
#[derive(Parser)]
#[command(name = "openmemory", version, about)]
struct Cli {
    /// Extra openmemory.json5 layered on top of user and project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path; overrides config and MEMORY_DB_PATH
    #[arg(long, global = true)]
    db_path: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the MCP protocol over stdio (default)
    Serve,
    /// Print aggregate memory counts
    Stats,
    /// Print the running abstract after folding in new messages
    Recall {
        /// Rebuild from the lookback window
        #[arg(long)]
        force_refresh: bool,
    },
    /// Print recent messages
    Recent {
        /// Days to look back
        #[arg(long)]
        max_days: Option<u32>,
    },
    /// Store one message
    Save {
        #[arg(long)]
        speaker: String,
        #[arg(long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    debug!(
        "starting openmemory (config_set={}, db_path_set={})",
        cli.config.is_some(),
        cli.db_path.is_some()
    );
    let config = load_config(&cwd, cli.config.as_deref(), cli.db_path.as_deref())?;
    let service = build_service(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("serving memory over MCP (db={})", config.storage.path);
            MemoryMcpServer::new(service).run().await?;
        }
        Command::Stats => print_json(serde_json::to_value(service.stats().await)?)?,
        Command::Recall { force_refresh } => {
            print_json(serde_json::to_value(service.recall_abstract(force_refresh).await)?)?
        }
        Command::Recent { max_days } => {
            print_json(serde_json::to_value(service.recent(max_days).await)?)?
        }
        Command::Save { speaker, message } => {
            print_json(serde_json::to_value(service.save(&speaker, &message, None).await)?)?
        }
    }
    Ok(())
}

fn print_json(value: Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
