//! Batch-level summary persisted next to the results.
//!
//! Written once by [`BatchCoordinator::finish_run`](crate::BatchCoordinator::finish_run)
//! as `batch_metadata.json` (camelCase keys). A batch folder without the file
//! was never finished cleanly.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// File name of the saved metadata inside a batch folder.
pub const METADATA_FILE: &str = "batch_metadata.json";

/// Summary of a finished batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    /// Batch number.
    pub batch_number: u64,
    /// Batch folder.
    pub folder: PathBuf,
    /// Folder the ledgers were seeded from, if any.
    pub previous_batch_folder: Option<PathBuf>,
    /// Run start, if [`start_run`](crate::BatchCoordinator::start_run) was called.
    pub started_at: Option<DateTime<Utc>>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
    /// Seconds between start and end, when both are known.
    pub elapsed_seconds: Option<f64>,
    /// Records written across all segments.
    pub records_written: usize,
    /// Keys in the visited ledger at the end of the run.
    pub visited_count: usize,
    /// Keys in the failed ledger at the end of the run.
    pub failed_count: usize,
    /// Every segment of the batch, in order.
    pub segments: Vec<SegmentMetadata>,
}

/// Summary of one result segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadata {
    /// Segment number within the batch.
    pub segment_number: u32,
    /// File name inside the batch folder.
    pub file: String,
    /// Lines written.
    pub lines: usize,
    /// Segment start.
    pub started_at: Option<DateTime<Utc>>,
    /// Segment end.
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchMetadata {
    /// Path of the metadata file in `folder`.
    #[must_use]
    pub fn path_in(folder: &Path) -> PathBuf {
        folder.join(METADATA_FILE)
    }

    /// Write the metadata to `folder` through a temp file and rename.
    pub fn save(&self, folder: &Path) -> Result<PathBuf> {
        let path = Self::path_in(folder);
        let json = serde_json::to_string_pretty(self)?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)
            .map_err(|e| Error::storage("write temp metadata", &tmp_path, &e))?;

        #[cfg(target_os = "windows")]
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| Error::storage("remove existing metadata", &path, &e))?;
        }
        fs::rename(&tmp_path, &path).map_err(|e| Error::storage("persist metadata", &path, &e))?;

        debug!("Saved metadata for batch {}", self.batch_number);
        Ok(path)
    }

    /// Load the metadata saved in `folder`, if there is any.
    pub fn load(folder: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(folder);
        if !path.exists() {
            return Ok(None);
        }
        let json =
            fs::read_to_string(&path).map_err(|e| Error::storage("read metadata", &path, &e))?;
        let metadata = serde_json::from_str(&json)?;
        Ok(Some(metadata))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(folder: &Path) -> BatchMetadata {
        let start = DateTime::parse_from_rfc3339("2024-01-02T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2024-01-02T10:00:30Z")
            .unwrap()
            .with_timezone(&Utc);
        BatchMetadata {
            batch_number: 4,
            folder: folder.to_path_buf(),
            previous_batch_folder: None,
            started_at: Some(start),
            finished_at: end,
            elapsed_seconds: Some(30.0),
            records_written: 3,
            visited_count: 3,
            failed_count: 1,
            segments: vec![SegmentMetadata {
                segment_number: 1,
                file: "batch_4_scraping_results_1.jsonl".into(),
                lines: 3,
                started_at: Some(start),
                finished_at: Some(end),
            }],
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let metadata = sample(temp.path());

        let path = metadata.save(temp.path()).unwrap();
        assert_eq!(path, temp.path().join(METADATA_FILE));
        assert!(!temp.path().join("batch_metadata.json.tmp").exists());

        let loaded = BatchMetadata::load(temp.path()).unwrap().unwrap();
        assert_eq!(loaded, metadata);
    }

    #[test]
    fn test_keys_are_camel_case() {
        let temp = TempDir::new().unwrap();
        sample(temp.path()).save(temp.path()).unwrap();

        let raw = fs::read_to_string(temp.path().join(METADATA_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["batchNumber"], 4);
        assert_eq!(value["recordsWritten"], 3);
        assert_eq!(value["segments"][0]["segmentNumber"], 1);
        assert!(value["previousBatchFolder"].is_null());
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(BatchMetadata::load(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(METADATA_FILE), "{ nope").unwrap();
        let err = BatchMetadata::load(temp.path()).unwrap_err();
        assert_eq!(err.category(), "serialization");
    }
}
