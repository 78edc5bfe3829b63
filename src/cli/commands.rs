//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Wellspring incremental REST extraction CLI
#[derive(Parser, Debug)]
#[command(name = "wellspring")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source definition file (YAML)
    #[arg(short = 's', long, global = true)]
    pub source: Option<PathBuf>,

    /// Runtime configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (JSON), read at start and updated with checkpoints
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON (takes precedence over --state)
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync records from the source
    Sync {
        /// Streams to sync (comma-separated, empty = all top-level streams)
        #[arg(long)]
        streams: Option<String>,

        /// Inline config JSON (takes precedence over --config)
        #[arg(long)]
        config_json: Option<String>,
    },

    /// Validate the source definition (and the runtime config if given)
    Validate {
        /// Inline config JSON
        #[arg(long)]
        config_json: Option<String>,
    },

    /// List streams declared by the source
    Streams,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
