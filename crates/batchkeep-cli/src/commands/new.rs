//! New command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use batchkeep_core::{BatchCoordinator, Config};
use colored::Colorize;
use serde::Serialize;

use super::{batch_request, batch_span};
use crate::output::{OutputFormat, print_json};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewBatchOutput {
    batch_number: u64,
    folder: PathBuf,
    data_root: PathBuf,
    previous_batch_folder: Option<PathBuf>,
    visited_count: usize,
    failed_count: usize,
}

/// Execute the new command
///
/// Creates the batch folder with seeded ledgers and an empty first segment.
pub fn execute(config: &Config, previous: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let span = batch_span();
    let request = batch_request(previous, config.paths.data_root.clone());
    let batch = BatchCoordinator::open(request, config, span.clone())
        .context("Failed to create batch")?;
    span.record("number", batch.number());

    let output = NewBatchOutput {
        batch_number: batch.number(),
        folder: batch.folder().to_path_buf(),
        data_root: batch.data_root().to_path_buf(),
        previous_batch_folder: batch.previous_batch_folder().map(PathBuf::from),
        visited_count: batch.visited().len(),
        failed_count: batch.failed().len(),
    };

    match format {
        OutputFormat::Text => print_text(&output),
        OutputFormat::Json => print_json(&output)?,
    }
    Ok(())
}

fn print_text(output: &NewBatchOutput) {
    println!(
        "{} batch {} at {}",
        "Created".green().bold(),
        output.batch_number.to_string().bold(),
        output.folder.display()
    );
    match &output.previous_batch_folder {
        Some(previous) => println!(
            "  seeded from {} ({} visited, {} failed)",
            previous.display(),
            output.visited_count,
            output.failed_count
        ),
        None => println!("  {}", "no previous batch".dimmed()),
    }
}
