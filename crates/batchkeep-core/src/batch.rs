//! Batch identity: numbering, folder naming and staging scans.
//!
//! Batch folders live under `<data_root>/staging/` and are named
//! `<YYYYMMDD>_batch_<N>`. Numbers only grow within one data root.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;

use crate::{Error, Result};

/// Name of the directory under the data root that holds batch folders.
pub const STAGING_DIR: &str = "staging";

/// Full-name pattern of a batch folder.
pub const BATCH_FOLDER_PATTERN: &str = r"^\d{8}_batch_\d+$";

/// Suffix pattern a previous batch folder must end with.
pub const PREVIOUS_BATCH_PATTERN: &str = r"_batch_(\d+)$";

#[allow(clippy::expect_used)]
static BATCH_FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BATCH_FOLDER_PATTERN).expect("batch folder regex is valid"));

#[allow(clippy::expect_used)]
static PREVIOUS_BATCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PREVIOUS_BATCH_PATTERN).expect("previous batch regex is valid"));

/// One dated, numbered unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    /// Batch number, starting at 1.
    pub number: u64,
    /// Folder holding the batch's ledgers and segments.
    pub folder: PathBuf,
    /// When the run was started, if it has been.
    pub start_time: Option<DateTime<Utc>>,
    /// When the run was finished, if it has been.
    pub end_time: Option<DateTime<Utc>>,
}

/// A batch folder found under a staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    /// Batch number parsed from the folder name.
    pub number: u64,
    /// Folder name, `<YYYYMMDD>_batch_<N>`.
    pub name: String,
    /// Full path of the folder.
    pub path: PathBuf,
}

/// Folder name for batch `number` created on `date`.
#[must_use]
pub fn batch_folder_name(date: NaiveDate, number: u64) -> String {
    format!("{}_batch_{number}", date.format("%Y%m%d"))
}

/// Whether `name` is a batch folder name.
#[must_use]
pub fn is_batch_folder_name(name: &str) -> bool {
    BATCH_FOLDER_RE.is_match(name)
}

/// Batch number encoded in a batch folder name.
///
/// Returns `None` for names that are not batch folders or whose number does
/// not fit in a `u64`.
#[must_use]
pub fn batch_number_of(name: &str) -> Option<u64> {
    if !is_batch_folder_name(name) {
        return None;
    }
    name.rsplit_once("_batch_")
        .and_then(|(_, digits)| digits.parse().ok())
}

/// Derive the next batch from a previous batch folder.
///
/// The trailing path segment must end in `_batch_<digits>`. Returns the new
/// batch number (`digits + 1`) and the data root, which is the absolute
/// folder two levels above the previous batch.
///
/// # Errors
///
/// [`Error::InvalidBatchFolder`] if the name does not match, the number
/// overflows, or the folder has no grandparent.
pub fn next_batch_after(previous_batch_folder: &Path) -> Result<(u64, PathBuf)> {
    let invalid = || Error::InvalidBatchFolder {
        path: previous_batch_folder.to_path_buf(),
        pattern: PREVIOUS_BATCH_PATTERN,
    };

    let name = previous_batch_folder
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(invalid)?;
    let previous: u64 = PREVIOUS_BATCH_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .ok_or_else(invalid)?;
    let number = previous.checked_add(1).ok_or_else(invalid)?;

    let absolute = std::path::absolute(previous_batch_folder)?;
    let data_root = absolute
        .parent()
        .and_then(Path::parent)
        .ok_or_else(invalid)?
        .to_path_buf();

    Ok((number, data_root))
}

/// List the batch folders under `staging`, ordered by number then name.
///
/// A missing staging directory yields an empty list. Entries that are not
/// directories or do not match [`BATCH_FOLDER_PATTERN`] are ignored.
pub fn list_batches(staging: &Path) -> Result<Vec<BatchEntry>> {
    if !staging.is_dir() {
        return Ok(Vec::new());
    }

    let entries =
        fs::read_dir(staging).map_err(|e| Error::storage("read staging folder", staging, &e))?;

    let mut batches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::storage("read staging entry", staging, &e))?;
        if !entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if let Some(number) = batch_number_of(&name) {
            batches.push(BatchEntry {
                number,
                path: entry.path(),
                name,
            });
        }
    }

    batches.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)));
    Ok(batches)
}

/// The highest-numbered batch under `staging`, if any.
///
/// Ties between folders with the same number resolve to the greatest name,
/// which is the most recent date.
pub fn latest_batch(staging: &Path) -> Result<Option<BatchEntry>> {
    Ok(list_batches(staging)?.pop())
}
