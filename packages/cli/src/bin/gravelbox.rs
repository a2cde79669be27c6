use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use gravelbox_cli::{init_tracing, run_server, AppState};
use gravelbox_config::GravelConfig;
use gravelbox_sandbox::{ContainerEngine, DockerCli, SandboxManager};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;

use cli::atoms::AtomsCommands;

#[derive(Parser)]
#[command(name = "gravelbox")]
#[command(about = "Gravelbox - run untrusted code in disposable containers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Listen address, overrides GRAVELBOX_API_ADDR
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Execute a sandbox request file and print its output
    Run {
        /// Path to a JSON sandbox request
        request: PathBuf,
        /// Print the full execution report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage atom images
    #[command(subcommand)]
    Atoms(AtomsCommands),
    /// Show the container engine version
    Version,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("info");

    let config = match GravelConfig::from_env().context("Invalid configuration") {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };
    let engine: Arc<dyn ContainerEngine> = Arc::new(DockerCli::from_config(&config));
    let manager = SandboxManager::new(engine.clone(), &config);

    let result = handle_command(cli.command, &config, engine, &manager).await;
    // Timed out containers are removed in the background; finish that before exiting
    manager.drain_teardowns().await;

    if let Err(e) = result {
        exit_with(e);
    }
}

fn exit_with(e: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), e);
    process::exit(1);
}

async fn handle_command(
    command: Commands,
    config: &GravelConfig,
    engine: Arc<dyn ContainerEngine>,
    manager: &SandboxManager,
) -> Result<()> {
    match command {
        Commands::Serve { addr } => {
            let version = engine.version().await.with_context(|| {
                format!(
                    "Engine cannot be found or can't be executed through '{}'",
                    config.engine_command
                )
            })?;
            info!("Engine version: {}", version);

            match manager.atoms().list().await {
                Ok(atoms) if atoms.is_empty() => warn!(
                    "No atom image built, run 'gravelbox atoms build <name>' before executing requests"
                ),
                Ok(atoms) => info!("{} atom(s) available", atoms.len()),
                Err(e) => warn!("Failed to list atoms: {}", e),
            }

            run_server(AppState::new(manager.clone()), addr.unwrap_or(config.api_addr)).await
        }
        Commands::Run { request, json } => cli::run::run_request(manager, &request, json).await,
        Commands::Atoms(command) => command.execute(manager.atoms()).await,
        Commands::Version => {
            println!("{}", engine.version().await?);
            Ok(())
        }
    }
}
