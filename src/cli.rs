//! Command-line interface definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// One-shot lookup plugins for IT-operations automation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a lookup plugin over one or more terms
    Run {
        /// Name of the lookup plugin (see `list`)
        plugin: String,

        /// Input terms
        terms: Vec<String>,

        /// Plugin options as key=value pairs
        #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Network timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// List the available lookup plugins
    List,
}

/// Output document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}
