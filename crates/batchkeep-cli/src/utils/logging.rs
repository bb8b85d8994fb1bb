//! Logging initialization and configuration.
//!
//! This module handles setting up the tracing subscriber and color control
//! based on CLI flags and environment variables.

use anyhow::{Result, anyhow};
use colored::control as color_control;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::Cli;

/// Level selected by the global verbosity flags.
///
/// Machine-readable output drops to errors unless verbose or debug logging
/// was asked for explicitly.
#[must_use]
pub fn level_for(cli: &Cli) -> LevelFilter {
    if cli.debug {
        LevelFilter::DEBUG
    } else if cli.verbose {
        LevelFilter::INFO
    } else if cli.quiet || cli.command.format().is_machine() {
        LevelFilter::ERROR
    } else {
        LevelFilter::WARN
    }
}

/// Initialize the logging subsystem based on CLI flags.
///
/// `RUST_LOG` overrides the flag-derived level. Logs go to stderr.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(cli).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to install logger: {e}"))?;

    let env_no_color = std::env::var_os("NO_COLOR").is_some();
    if cli.no_color || env_no_color || cli.command.format().is_machine() {
        color_control::set_override(false);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_level_from_flags() {
        assert_eq!(level_for(&parse(&["batchkeep", "status"])), LevelFilter::WARN);
        assert_eq!(level_for(&parse(&["batchkeep", "-v", "status"])), LevelFilter::INFO);
        assert_eq!(level_for(&parse(&["batchkeep", "--debug", "status"])), LevelFilter::DEBUG);
        assert_eq!(level_for(&parse(&["batchkeep", "-q", "status"])), LevelFilter::ERROR);
    }

    #[test]
    fn test_json_output_quiets_logs() {
        let cli = parse(&["batchkeep", "status", "--format", "json"]);
        assert_eq!(level_for(&cli), LevelFilter::ERROR);

        let cli = parse(&["batchkeep", "-v", "status", "--format", "json"]);
        assert_eq!(level_for(&cli), LevelFilter::INFO);
    }
}
