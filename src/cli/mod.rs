//! Command-line interface
//!
//! Subcommand-per-operation: `sync` runs the extraction and prints messages
//! as JSON lines, `validate` checks a definition without touching the
//! network, `streams` lists the stream table.

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
