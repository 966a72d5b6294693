use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tspipe - incremental multi-target compilation orchestrator
#[derive(Parser, Debug)]
#[command(name = "tspipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit diagnostics as NDJSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile every root file for every active target
    Build(BuildArgs),

    /// Compile, then recompile on file changes until Ctrl+C
    Watch(BuildArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Project root directory
    #[arg(short, long, default_value = ".")]
    pub project: PathBuf,

    /// Configuration file (defaults to <project>/tspipe.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Targets to build (repeatable, comma separated; `*` for untargeted)
    #[arg(short, long = "target", value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Comma separated addons to run instead of the configured ones
    #[arg(long)]
    pub addons: Option<String>,

    /// Directory scanned for addon manifests
    #[arg(long)]
    pub addon_dir: Option<PathBuf>,

    /// Output directory override
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Emit source maps
    #[arg(long)]
    pub source_map: bool,

    /// Skip checking and transpile each file on its own
    #[arg(long)]
    pub transpile_only: bool,

    /// Debug mode (implies verbose logging)
    #[arg(long)]
    pub debug: bool,
}
