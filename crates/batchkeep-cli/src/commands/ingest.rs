//! Ingest command implementation
//!
//! Reads crawl results as JSON lines and runs them through one batch:
//!
//! ```text
//! {"title": "Utrecht", "exists": true, "links": ["Nederland"]}
//! {"title": "Nergens", "error": "404"}
//! ```
//!
//! Lines whose title was visited or failed before are skipped. Lines that
//! are not valid JSON, or whose title is blank or spans several lines, are
//! logged and counted, not fatal.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use batchkeep_core::{BatchCoordinator, Config, Error, PageRecord};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{batch_request, batch_span};
use crate::output::{OutputFormat, print_json};

/// One input line
#[derive(Debug, Deserialize)]
struct InputRecord {
    title: String,
    #[serde(default)]
    exists: Option<bool>,
    #[serde(default)]
    links: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

/// Result of an ingest run
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    /// Batch number
    pub batch_number: u64,
    /// Batch folder
    pub folder: PathBuf,
    /// Pages written to result segments
    pub pages: usize,
    /// Titles added to the failed ledger
    pub failures: usize,
    /// Lines skipped because their title was already handled
    pub skipped: usize,
    /// Lines that could not be parsed
    pub invalid: usize,
    /// Result segments used
    pub segments: usize,
    /// Visited ledger size after the run
    pub visited_count: usize,
    /// Failed ledger size after the run
    pub failed_count: usize,
    /// Run duration in seconds
    pub elapsed_seconds: Option<f64>,
}

/// Execute the ingest command
pub fn execute(
    config: &Config,
    previous: Option<PathBuf>,
    input: Option<&Path>,
    format: OutputFormat,
) -> Result<IngestSummary> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let span = batch_span();
    let request = batch_request(previous, config.paths.data_root.clone());
    let mut batch = BatchCoordinator::open(request, config, span.clone())
        .context("Failed to create batch")?;
    span.record("number", batch.number());

    batch.start_run();
    let mut summary = IngestSummary::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        ingest_line(&mut batch, &line, index + 1, &mut summary)?;
    }
    let metadata = batch.finish_run().context("Failed to finish batch")?;

    summary.batch_number = metadata.batch_number;
    summary.folder = metadata.folder;
    summary.segments = metadata.segments.len();
    summary.visited_count = metadata.visited_count;
    summary.failed_count = metadata.failed_count;
    summary.elapsed_seconds = metadata.elapsed_seconds;

    match format {
        OutputFormat::Text => print_text(&summary),
        OutputFormat::Json => print_json(&summary)?,
    }
    Ok(summary)
}

fn ingest_line(
    batch: &mut BatchCoordinator,
    line: &str,
    line_number: usize,
    summary: &mut IngestSummary,
) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let record: InputRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(e) => {
            warn!("Skipping invalid input on line {line_number}: {e}");
            summary.invalid += 1;
            return Ok(());
        },
    };

    if batch.should_skip(&record.title) {
        debug!("Skipping '{}', already handled", record.title);
        summary.skipped += 1;
        return Ok(());
    }

    let (recorded, counter) = if let Some(error) = record.error {
        debug!("Recording failure for '{}': {error}", record.title);
        (batch.record_failure(&record.title).map(drop), &mut summary.failures)
    } else {
        let page = PageRecord::new(record.title, record.exists.unwrap_or(true), record.links);
        (batch.record_page(&page).map(drop), &mut summary.pages)
    };

    match recorded {
        Ok(()) => *counter += 1,
        Err(err @ Error::InvalidRecord { .. }) => {
            warn!("Skipping invalid input on line {line_number}: {err}");
            summary.invalid += 1;
        },
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn print_text(summary: &IngestSummary) {
    println!(
        "{} batch {} at {}",
        "Finished".green().bold(),
        summary.batch_number.to_string().bold(),
        summary.folder.display()
    );
    println!(
        "  {} pages, {} failures, {} skipped",
        summary.pages, summary.failures, summary.skipped
    );
    if summary.invalid > 0 {
        println!("  {} invalid lines", summary.invalid.to_string().yellow());
    }
    println!(
        "  {} segment(s); ledgers now hold {} visited, {} failed",
        summary.segments, summary.visited_count, summary.failed_count
    );
    if let Some(seconds) = summary.elapsed_seconds {
        println!("  {}", format!("took {seconds:.2}s").dimmed());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    fn config(root: &Path, capacity: usize) -> Config {
        let mut config = Config::default();
        config.paths.data_root = Some(root.to_path_buf());
        config.batch.segment_capacity = capacity;
        config
    }

    #[test]
    fn test_ingest_counts_each_kind_of_line() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("pages.jsonl");
        fs::write(
            &input,
            concat!(
                "{\"title\":\"Utrecht\",\"exists\":true,\"links\":[\"Nederland\"]}\n",
                "\n",
                "{\"title\":\"Nergens\",\"error\":\"404\"}\n",
                "not json\n",
                "{\"title\":\"Utrecht\",\"exists\":true}\n",
                "{\"title\":\"Leeg\",\"exists\":false}\n",
                "{\"title\":\"Foo\\nBar\",\"exists\":true}\n",
                "{\"title\":\" \",\"error\":\"404\"}\n",
            ),
        )
        .unwrap();

        let summary = execute(
            &config(root.path(), 100),
            None,
            Some(&input),
            OutputFormat::Json,
        )
        .unwrap();

        assert_eq!(summary.batch_number, 1);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.invalid, 3);
        assert_eq!(summary.visited_count, 2);
        assert_eq!(summary.failed_count, 1);
    }

    #[test]
    fn test_second_ingest_skips_known_titles() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("pages.jsonl");
        fs::write(&input, "{\"title\":\"A\",\"exists\":true}\n{\"title\":\"B\",\"error\":\"x\"}\n")
            .unwrap();
        let config = config(root.path(), 100);

        execute(&config, None, Some(&input), OutputFormat::Json).unwrap();
        let second = execute(&config, None, Some(&input), OutputFormat::Json).unwrap();

        assert_eq!(second.batch_number, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.pages, 0);
    }

    #[test]
    fn test_missing_input_file_fails_before_batch_creation() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("missing.jsonl");

        let result = execute(
            &config(root.path(), 100),
            None,
            Some(&missing),
            OutputFormat::Json,
        );
        assert!(result.is_err());
        assert!(!root.path().join("staging").exists());
    }
}
