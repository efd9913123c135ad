pub mod commands;
pub mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::store::{DocumentStore, PgDocumentStore};

#[derive(Parser)]
#[command(name = "carectl")]
#[command(about = "Care Orders admin CLI - staff registry and record inspection")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Medical staff registry management")]
    Staff {
        #[command(subcommand)]
        cmd: commands::staff::StaffCommands,
    },

    #[command(about = "Inspect pending order requests")]
    Requests {
        #[command(subcommand)]
        cmd: commands::records::RecordCommands,
    },

    #[command(about = "Inspect fulfilled orders")]
    Orders {
        #[command(subcommand)]
        cmd: commands::records::RecordCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Connect to the Postgres document store named by `DATABASE_URL` and run
/// one command against it.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env();

    let store = PgDocumentStore::connect(&config.store)
        .await
        .context("failed to connect to the document store (is DATABASE_URL set?)")?;

    let result = execute(cli.command, &store, &config, output_format).await;
    store.close().await;

    println!("{}", result?);
    Ok(())
}

/// Dispatch a command and return its rendered output.
pub async fn execute(
    command: Commands,
    store: &dyn DocumentStore,
    config: &AppConfig,
    output_format: OutputFormat,
) -> anyhow::Result<String> {
    match command {
        Commands::Staff { cmd } => commands::staff::handle(cmd, store, config, output_format).await,
        Commands::Requests { cmd } => {
            commands::records::handle_requests(cmd, store, config, output_format).await
        }
        Commands::Orders { cmd } => {
            commands::records::handle_orders(cmd, store, config, output_format).await
        }
    }
}
