//! dockenv - cached container build environments
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use dockenv::cli::{Cli, Commands};
use dockenv::config::ConfigManager;
use dockenv::error::DockenvResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            if e.is_configuration() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run() -> DockenvResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug; DOCKENV_LOG overrides
    let filter = match std::env::var("DOCKENV_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => match cli.verbose {
            0 => EnvFilter::new("dockenv=warn"),
            1 => EnvFilter::new("dockenv=info"),
            _ => EnvFilter::new("dockenv=debug"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Init command doesn't need config loading
    if let Commands::Init(args) = cli.command {
        return dockenv::cli::commands::init(args).await;
    }

    let manager = ConfigManager::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Init(_) => unreachable!("Init handled above"),
        Commands::Run(args) => dockenv::cli::commands::run(args, &manager).await,
        Commands::Gc(args) => dockenv::cli::commands::gc(args, &manager).await,
        Commands::Cache(args) => dockenv::cli::commands::cache(args, &manager).await,
        Commands::Config(args) => dockenv::cli::commands::config(args, &manager).await,
    }
}
