//! Opslookup - lookup plugins for IT-operations automation
//!
//! This is the main entry point for the opslookup CLI.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use opslookup::config::Config;
use opslookup::lookup::{LookupContext, LookupRegistry, Options};
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        if cli.verbose >= 1 {
            eprintln!("Warning: failed to load config: {e}");
        }
        Config::default()
    });

    let registry = LookupRegistry::with_builtins();
    match cli.command {
        Commands::List => {
            for (name, description) in registry.entries() {
                println!("{name:<38} {description}");
            }
        }
        Commands::Run {
            plugin,
            terms,
            options,
            format,
            timeout,
        } => {
            let options = Options::from_pairs(&options)?;
            let ctx = LookupContext::new()
                .with_config(config)
                .with_timeout(timeout);
            let results = registry.run(&plugin, &terms, &options, &ctx)?;
            print_results(results, format)?;
        }
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}

/// Print the per-term results as a single document on stdout
fn print_results(results: Vec<Value>, format: OutputFormat) -> Result<()> {
    let document = Value::Array(results);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&document)?),
    }
    Ok(())
}
