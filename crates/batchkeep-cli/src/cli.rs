//! # CLI Structure and Argument Parsing
//!
//! The CLI follows a command-subcommand pattern built with `clap` derive:
//!
//! - **Global options**: `--config`, `--data-root`, `--verbose`, `--debug`,
//!   `--quiet`, `--no-color`
//! - **Subcommands**: `new`, `ingest`, `status`
//!
//! ## Usage Patterns
//!
//! ```bash
//! # Start a batch after the latest one under the data root
//! batchkeep --data-root /srv/crawl/data new
//!
//! # Continue from an explicit previous batch
//! batchkeep new --previous /srv/crawl/data/staging/20240101_batch_3
//!
//! # Feed crawl results into a new batch
//! crawler --emit-jsonl | batchkeep --data-root /srv/crawl/data ingest
//!
//! # Inspect batches
//! batchkeep --data-root /srv/crawl/data status --format json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Main CLI structure for the `batchkeep` command
#[derive(Parser, Clone, Debug)]
#[command(name = "batchkeep")]
#[command(version)]
#[command(about = "batchkeep - resumable batch state for web crawls", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable informational logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress everything but errors
    #[arg(short = 'q', long, global = true, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable all ANSI colors in output (also respects `NO_COLOR` env)
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Path to configuration file. Also via `BATCHKEEP_CONFIG`.
    #[arg(long, global = true, value_name = "FILE", env = "BATCHKEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the `staging` folder. Also via `BATCHKEEP_DATA_ROOT`.
    #[arg(
        long = "data-root",
        global = true,
        value_name = "DIR",
        env = "BATCHKEEP_DATA_ROOT"
    )]
    pub data_root: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create the next batch folder and seed its ledgers
    New {
        /// Previous batch folder to continue from (default: latest under the data root)
        #[arg(long, value_name = "FOLDER")]
        previous: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run a batch from JSON lines of crawl results
    ///
    /// Each line is either `{"title", "exists", "links"}` for a fetched page
    /// or `{"title", "error"}` for a failed one. Titles already visited or
    /// failed in earlier batches are skipped.
    Ingest {
        /// Previous batch folder to continue from (default: latest under the data root)
        #[arg(long, value_name = "FOLDER")]
        previous: Option<PathBuf>,

        /// Input file (default: stdin)
        #[arg(short = 'i', long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Records per result segment (overrides `batch.segment_capacity`)
        #[arg(long, value_name = "N")]
        capacity: Option<usize>,

        /// Output format for the summary
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List batches under the data root
    Status {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl Commands {
    /// Output format selected for this command
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        match self {
            Self::New { format, .. } | Self::Ingest { format, .. } | Self::Status { format } => {
                *format
            },
        }
    }
}
