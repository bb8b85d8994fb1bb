//! Status command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use batchkeep_core::{BatchMetadata, Config, STAGING_DIR, list_batches, resolve_data_root};
use colored::Colorize;
use serde::Serialize;
use tracing::{Span, warn};

use crate::output::{OutputFormat, print_json};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchStatus {
    number: u64,
    name: String,
    path: PathBuf,
    finished: bool,
    metadata: Option<BatchMetadata>,
}

/// Execute the status command
pub fn execute(config: &Config, format: OutputFormat) -> Result<()> {
    let data_root = resolve_data_root(None, config, &Span::current())
        .context("Failed to resolve data root")?;
    let staging = data_root.join(STAGING_DIR);
    let batches = list_batches(&staging)
        .with_context(|| format!("Failed to list batches in '{}'", staging.display()))?;

    let statuses: Vec<BatchStatus> = batches
        .into_iter()
        .map(|entry| {
            let metadata = BatchMetadata::load(&entry.path).unwrap_or_else(|err| {
                warn!("Ignoring unreadable metadata in '{}': {err}", entry.path.display());
                None
            });
            BatchStatus {
                number: entry.number,
                finished: metadata.is_some(),
                name: entry.name,
                path: entry.path,
                metadata,
            }
        })
        .collect();

    match format {
        OutputFormat::Text => print_text(&staging, &statuses),
        OutputFormat::Json => print_json(&statuses)?,
    }
    Ok(())
}

fn print_text(staging: &std::path::Path, statuses: &[BatchStatus]) {
    if statuses.is_empty() {
        println!(
            "No batches in {}. Use 'batchkeep new' to start one.",
            staging.display()
        );
        return;
    }

    println!("Batches in {}:", staging.display());
    for status in statuses {
        let state = if status.finished {
            "finished".green()
        } else {
            "open".yellow()
        };
        print!("  #{:<4} {}  {}", status.number, status.name.bold(), state);
        if let Some(metadata) = &status.metadata {
            print!(
                "  {} records, {} segment(s), {} visited, {} failed",
                metadata.records_written,
                metadata.segments.len(),
                metadata.visited_count,
                metadata.failed_count
            );
        }
        println!();
    }
}
