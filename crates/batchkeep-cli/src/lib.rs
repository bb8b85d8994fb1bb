//! batchkeep CLI - resumable batch state for web crawls
//!
//! Command implementations are organized in separate modules; this file
//! parses arguments, sets up logging and configuration, and dispatches.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod output;
mod utils;

use cli::{Cli, Commands};
use utils::{initialize_logging, load_config};

/// Execute the batchkeep CLI with the current process arguments.
///
/// # Errors
///
/// Returns an error if logging, configuration or the command fails.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;
    let config = load_config(&cli)?;
    execute_command(cli.command, &config)
}

fn execute_command(command: Commands, config: &batchkeep_core::Config) -> Result<()> {
    match command {
        Commands::New { previous, format } => {
            commands::new_batch(config, previous, format)?;
        },
        Commands::Ingest {
            previous,
            input,
            capacity,
            format,
        } => {
            let mut config = config.clone();
            if let Some(capacity) = capacity {
                config.batch.segment_capacity = capacity;
                config.validate()?;
            }
            commands::ingest(&config, previous, input.as_deref(), format)?;
        },
        Commands::Status { format } => {
            commands::status(config, format)?;
        },
    }
    Ok(())
}
