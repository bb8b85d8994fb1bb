//! # Output Formatting
//!
//! Commands print either human-readable text or a single JSON document:
//!
//! - **Text**: colored summaries for interactive use
//! - **JSON**: one pretty-printed object or array on stdout for scripts
//!
//! Logs always go to stderr, so JSON output stays parseable.

use anyhow::Result;
use serde::Serialize;

/// Output format for command results
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Single JSON document
    Json,
}

impl OutputFormat {
    /// Whether the output is meant for machines
    #[must_use]
    pub const fn is_machine(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
