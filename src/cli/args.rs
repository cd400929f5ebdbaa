//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// dockenv - cached container build environments
///
/// Builds a chain of container images from numbered setup scripts, reusing
/// every step whose inputs have not changed, then runs a command in the
/// final image as the invoking user.
#[derive(Parser, Debug)]
#[command(name = "dockenv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DOCKENV_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a target's image chain and run a command in it
    Run(RunArgs),

    /// Remove cached images the target no longer uses
    Gc(GcArgs),

    /// Inspect the image cache
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),

    /// Create a dockenv.toml in a project directory
    Init(InitArgs),
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite existing dockenv.toml
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Target to build (defaults to general.default_target)
    pub target: Option<String>,

    /// Build the image chain without running a command
    #[arg(long)]
    pub build_only: bool,

    /// Remove unused cached images after building
    #[arg(long)]
    pub cleanup: bool,

    /// Develop scripts against the live base directory
    #[arg(long)]
    pub develop: bool,

    /// Working directory inside the container
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Command and arguments to run (defaults to the entrypoint's shell)
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// Arguments for the gc command
#[derive(Parser, Debug)]
pub struct GcArgs {
    /// Target whose image chain is kept
    pub target: Option<String>,

    /// Report unused images without removing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// List configured targets
    Targets,
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached images
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}
