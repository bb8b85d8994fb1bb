//! Batch lifecycle orchestration.
//!
//! [`BatchCoordinator`] owns everything that belongs to one batch: the
//! visited and failed [`Ledger`]s, the [`ResultSegment`]s and the batch
//! identity. Opening a coordinator derives the batch number, creates the
//! folder, seeds both ledgers from the previous batch and opens segment 1.
//!
//! ```no_run
//! use batchkeep_core::{BatchCoordinator, BatchRequest, Config, PageRecord};
//! use tracing::Span;
//!
//! # fn main() -> batchkeep_core::Result<()> {
//! let config = Config::default();
//! let request = BatchRequest::in_data_root("/srv/crawl/data");
//! let mut batch = BatchCoordinator::open(request, &config, Span::current())?;
//!
//! batch.start_run();
//! if !batch.should_skip("Amsterdam") {
//!     batch.record_page(&PageRecord::new("Amsterdam", true, Some(vec!["Nederland".into()])))?;
//! }
//! let summary = batch.finish_run()?;
//! println!("{} records", summary.records_written);
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tracing::{Span, debug, info, info_span, warn};

use crate::batch::{
    BATCH_FOLDER_PATTERN, Batch, STAGING_DIR, batch_folder_name, latest_batch, next_batch_after,
};
use crate::data_root::resolve_data_root;
use crate::metadata::{BatchMetadata, SegmentMetadata};
use crate::{Config, Error, Ledger, PageRecord, Result, ResultSegment, StateError};

/// Where a new batch should come from.
///
/// With a previous batch folder the data root is derived from it and the
/// data root field is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    /// Folder of the batch to continue from.
    pub previous_batch_folder: Option<PathBuf>,
    /// Data root to scan for the latest batch.
    pub data_root: Option<PathBuf>,
}

impl BatchRequest {
    /// Continue from an explicit previous batch folder.
    pub fn from_previous(folder: impl Into<PathBuf>) -> Self {
        Self {
            previous_batch_folder: Some(folder.into()),
            data_root: None,
        }
    }

    /// Continue from the latest batch found under `data_root`.
    pub fn in_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            previous_batch_folder: None,
            data_root: Some(data_root.into()),
        }
    }
}

/// Owner of one batch's ledgers and result segments.
#[derive(Debug)]
pub struct BatchCoordinator {
    batch: Batch,
    data_root: PathBuf,
    staging_folder: PathBuf,
    previous_batch_folder: Option<PathBuf>,
    visited: Ledger,
    failed: Ledger,
    completed: Vec<ResultSegment>,
    active: ResultSegment,
    capacity: usize,
    finished: bool,
    span: Span,
}

impl BatchCoordinator {
    /// Set up a new batch on disk.
    ///
    /// The data root is resolved from the request's previous batch folder,
    /// then the request's data root, then `paths.data_root`, then discovery
    /// when it is enabled. Nothing is cleaned up if a step after folder
    /// creation fails.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBatchFolder`] for a malformed previous batch folder
    /// - [`Error::Config`] for invalid settings or no usable data root
    /// - [`Error::Io`] with kind `AlreadyExists` if the batch folder exists
    /// - [`Error::Storage`] for any other filesystem failure
    pub fn open(request: BatchRequest, config: &Config, span: Span) -> Result<Self> {
        config.validate()?;

        let (number, data_root, previous_batch_folder) = match request.previous_batch_folder {
            Some(previous) => {
                let (number, data_root) = next_batch_after(&previous)?;
                (number, data_root, Some(previous))
            },
            None => {
                let data_root = resolve_data_root(request.data_root.as_deref(), config, &span)?;
                let staging = data_root.join(STAGING_DIR);
                match latest_batch(&staging)? {
                    Some(latest) => {
                        let number = latest.number.checked_add(1).ok_or_else(|| {
                            Error::InvalidBatchFolder {
                                path: latest.path.clone(),
                                pattern: BATCH_FOLDER_PATTERN,
                            }
                        })?;
                        info!(parent: &span, "Latest batch found at '{}'", latest.path.display());
                        (number, data_root, Some(latest.path))
                    },
                    None => {
                        info!(parent: &span, "No previous batch found, starting at batch 1");
                        (1, data_root, None)
                    },
                }
            },
        };

        let staging_folder = data_root.join(STAGING_DIR);
        fs::create_dir_all(&staging_folder)
            .map_err(|e| Error::storage("create staging folder", &staging_folder, &e))?;

        let folder = staging_folder.join(batch_folder_name(Local::now().date_naive(), number));
        fs::create_dir(&folder).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to create batch folder '{}': {e}", folder.display()),
            ))
        })?;
        info!(parent: &span, "Batch {} folder created at '{}'", number, folder.display());

        let previous = previous_batch_folder.as_deref();
        let visited = Ledger::open(
            &folder,
            previous,
            &config.batch.visited_file,
            ledger_span(&span, &config.batch.visited_file),
        )?;
        let failed = Ledger::open(
            &folder,
            previous,
            &config.batch.failed_file,
            ledger_span(&span, &config.batch.failed_file),
        )?;

        let capacity = config.batch.segment_capacity;
        let active = ResultSegment::open(number, 1, &folder, capacity, segment_span(&span, 1))?;

        Ok(Self {
            batch: Batch {
                number,
                folder,
                start_time: None,
                end_time: None,
            },
            data_root,
            staging_folder,
            previous_batch_folder,
            visited,
            failed,
            completed: Vec::new(),
            active,
            capacity,
            finished: false,
            span,
        })
    }

    /// Record the start of the run.
    ///
    /// The active segment takes the same start time unless it already has
    /// one. Calling this again overwrites the batch start time.
    pub fn start_run(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        if let Some(previous) = self.batch.start_time {
            warn!(
                parent: &self.span,
                previous = %previous,
                "Batch {} run was already started, resetting start time", self.batch.number
            );
        }
        self.batch.start_time = Some(now);
        if self.active.start_time().is_none() {
            self.active.set_start_time(now);
        }
        info!(parent: &self.span, "Batch {} run started", self.batch.number);
        now
    }

    /// Write one record, rolling over to a new segment when the active one
    /// is full.
    ///
    /// Returns the number of the segment that received the line.
    pub fn write_record(&mut self, line: &str) -> Result<u32> {
        self.ensure_running()?;
        if self.active.write_line(line)? {
            return Ok(self.active.segment_number());
        }

        let segment_number = self.rotate_segment()?;
        if self.active.write_line(line)? {
            Ok(segment_number)
        } else {
            Err(Error::Storage(format!(
                "Segment {} refused a record with capacity {}",
                segment_number, self.capacity
            )))
        }
    }

    /// Finish the active segment and open the next one.
    ///
    /// Returns the new segment number.
    pub fn rotate_segment(&mut self) -> Result<u32> {
        self.ensure_running()?;
        self.active.flush()?;
        if let Err(err) = self.active.finish() {
            debug!(parent: &self.span, "Rotating segment that could not be finished: {err}");
        }

        let current = self.active.segment_number();
        let next = current.checked_add(1).ok_or_else(|| {
            Error::Storage(format!(
                "Batch {} has no segment number after {current}",
                self.batch.number
            ))
        })?;
        let mut segment = ResultSegment::open(
            self.batch.number,
            next,
            &self.batch.folder,
            self.capacity,
            segment_span(&self.span, next),
        )?;
        segment.mark_started();

        let previous = std::mem::replace(&mut self.active, segment);
        self.completed.push(previous);
        info!(
            parent: &self.span,
            "Rolled over from segment {} to segment {}", current, next
        );
        Ok(next)
    }

    /// Write a page as a result line and mark its title visited.
    ///
    /// Returns the segment number that received the record.
    ///
    /// A title the visited ledger cannot hold is rejected with
    /// [`Error::InvalidRecord`] before anything is written.
    pub fn record_page(&mut self, page: &PageRecord) -> Result<u32> {
        Ledger::validate_key(&page.title)?;
        let line = page.to_json_line()?;
        let segment = self.write_record(&line)?;
        self.visited.add(page.title.as_str(), true)?;
        Ok(segment)
    }

    /// Mark a key as failed. Returns `true` if it was not failed before.
    pub fn record_failure(&mut self, key: &str) -> Result<bool> {
        self.ensure_running()?;
        let added = self.failed.add(key, true)?;
        debug!(parent: &self.span, "Recorded failure for '{}'", key);
        Ok(added)
    }

    /// Whether `key` is in the visited ledger.
    #[must_use]
    pub fn is_visited(&self, key: &str) -> bool {
        self.visited.contains(key)
    }

    /// Whether `key` is in the failed ledger.
    #[must_use]
    pub fn has_failed(&self, key: &str) -> bool {
        self.failed.contains(key)
    }

    /// Whether `key` was already visited or already failed.
    #[must_use]
    pub fn should_skip(&self, key: &str) -> bool {
        self.is_visited(key) || self.has_failed(key)
    }

    /// End the run: finish the active segment, finalize both ledgers and
    /// save `batch_metadata.json`.
    ///
    /// Lifecycle problems along the way (a segment that was never started,
    /// a ledger finalized by hand) are logged and do not stop the run from
    /// finishing.
    ///
    /// # Errors
    ///
    /// [`StateError::BatchAlreadyFinished`] on a second call, or any I/O
    /// error from flushing, finalizing or saving.
    pub fn finish_run(&mut self) -> Result<BatchMetadata> {
        self.ensure_running()?;
        let end = Utc::now();
        self.batch.end_time = Some(end);

        self.active.flush()?;
        if let Err(err) = self.active.finish() {
            warn!(parent: &self.span, "Active segment not finished cleanly: {err}");
        }

        let span = &self.span;
        for ledger in [&mut self.visited, &mut self.failed] {
            match ledger.finalize() {
                Ok(backup) => debug!(
                    parent: span,
                    "Ledger '{}' backed up to '{}'",
                    ledger.file_name(),
                    backup.display()
                ),
                Err(Error::State(err)) => {
                    warn!(parent: span, "Ledger '{}': {err}", ledger.file_name());
                },
                Err(err) => return Err(err),
            }
        }

        let metadata = self.build_metadata(end);
        let path = metadata.save(&self.batch.folder)?;
        self.finished = true;
        info!(
            parent: &self.span,
            records = metadata.records_written,
            segments = metadata.segments.len(),
            "Batch {} finished, metadata saved to '{}'",
            self.batch.number,
            path.display()
        );
        Ok(metadata)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.finished {
            warn!(parent: &self.span, "Batch {} is already finished", self.batch.number);
            return Err(StateError::BatchAlreadyFinished.into());
        }
        Ok(())
    }

    fn build_metadata(&self, end: DateTime<Utc>) -> BatchMetadata {
        let segments: Vec<SegmentMetadata> = self
            .segments()
            .map(|segment| SegmentMetadata {
                segment_number: segment.segment_number(),
                file: segment
                    .path()
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                lines: segment.line_count(),
                started_at: segment.start_time(),
                finished_at: segment.end_time(),
            })
            .collect();

        BatchMetadata {
            batch_number: self.batch.number,
            folder: self.batch.folder.clone(),
            previous_batch_folder: self.previous_batch_folder.clone(),
            started_at: self.batch.start_time,
            finished_at: end,
            elapsed_seconds: self
                .batch
                .start_time
                .and_then(|start| (end - start).to_std().ok())
                .map(|elapsed| elapsed.as_secs_f64()),
            records_written: self.records_written(),
            visited_count: self.visited.len(),
            failed_count: self.failed.len(),
            segments,
        }
    }

    /// The batch identity and run times.
    #[must_use]
    pub const fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Batch number.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.batch.number
    }

    /// Batch folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.batch.folder
    }

    /// Data root holding the staging folder.
    #[must_use]
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Staging folder holding every batch folder.
    #[must_use]
    pub fn staging_folder(&self) -> &Path {
        &self.staging_folder
    }

    /// Folder the ledgers were seeded from, if any.
    #[must_use]
    pub fn previous_batch_folder(&self) -> Option<&Path> {
        self.previous_batch_folder.as_deref()
    }

    /// Visited ledger.
    #[must_use]
    pub const fn visited(&self) -> &Ledger {
        &self.visited
    }

    /// Visited ledger, mutably.
    pub const fn visited_mut(&mut self) -> &mut Ledger {
        &mut self.visited
    }

    /// Failed ledger.
    #[must_use]
    pub const fn failed(&self) -> &Ledger {
        &self.failed
    }

    /// Failed ledger, mutably.
    pub const fn failed_mut(&mut self) -> &mut Ledger {
        &mut self.failed
    }

    /// Segment currently receiving records.
    #[must_use]
    pub const fn active_segment(&self) -> &ResultSegment {
        &self.active
    }

    /// Every segment of the batch in order, the active one last.
    pub fn segments(&self) -> impl Iterator<Item = &ResultSegment> {
        self.completed.iter().chain(std::iter::once(&self.active))
    }

    /// Records written across all segments.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.segments().map(ResultSegment::line_count).sum()
    }

    /// Whether [`finish_run`](Self::finish_run) has completed.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

fn ledger_span(parent: &Span, file_name: &str) -> Span {
    info_span!(parent: parent, "ledger", file = %file_name)
}

fn segment_span(parent: &Span, segment: u32) -> Span {
    info_span!(parent: parent, "segment", segment)
}
