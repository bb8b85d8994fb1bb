//! Capacity-bounded result files.
//!
//! A [`ResultSegment`] is one `batch_<b>_scraping_results_<s>.jsonl` file
//! inside a batch folder. It accepts at most `capacity` lines and then
//! refuses further writes; it never rotates itself; the
//! [`BatchCoordinator`](crate::BatchCoordinator) opens the successor.
//!
//! ```text
//! CREATED --start--> ACTIVE --finish--> FINISHED
//! ```
//!
//! The start time is assigned by the caller. Finishing twice or finishing
//! before a start time exists is rejected with a [`StateError`].

use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{Span, debug, error, info, warn};

use crate::{Error, Result, StateError};

/// File name of a result segment.
#[must_use]
pub fn segment_file_name(batch_number: u64, segment_number: u32) -> String {
    format!("batch_{batch_number}_scraping_results_{segment_number}.jsonl")
}

/// One append-only, capacity-bounded output file.
#[derive(Debug)]
pub struct ResultSegment {
    batch_number: u64,
    segment_number: u32,
    path: PathBuf,
    writer: LineWriter<File>,
    line_count: usize,
    capacity: usize,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    elapsed: Option<TimeDelta>,
    finished: bool,
    span: Span,
}

impl ResultSegment {
    /// Create a new, empty segment file in `batch_folder`.
    ///
    /// An existing file with the same name is truncated.
    pub fn open(
        batch_number: u64,
        segment_number: u32,
        batch_folder: &Path,
        capacity: usize,
        span: Span,
    ) -> Result<Self> {
        let path = batch_folder.join(segment_file_name(batch_number, segment_number));
        let file = File::create(&path).map_err(|e| Error::storage("create segment", &path, &e))?;
        debug!(parent: &span, "New results file created at '{}'", path.display());
        info!(
            parent: &span,
            "Segment {} of batch {} initialised", segment_number, batch_number
        );

        Ok(Self {
            batch_number,
            segment_number,
            path,
            writer: LineWriter::new(file),
            line_count: 0,
            capacity,
            start_time: None,
            end_time: None,
            elapsed: None,
            finished: false,
            span,
        })
    }

    /// Append one record as a line.
    ///
    /// Returns `Ok(false)` without writing when the segment is full. Each
    /// accepted line is handed to the OS before returning.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRecord`] if `line` contains `\n` or `\r`, since it
    /// would count once but occupy several lines of the file.
    pub fn write_line(&mut self, line: &str) -> Result<bool> {
        if line.contains(['\n', '\r']) {
            return Err(Error::InvalidRecord {
                value: line.to_string(),
                reason: "result lines cannot contain line breaks",
            });
        }
        if self.line_count >= self.capacity {
            debug!(
                parent: &self.span,
                capacity = self.capacity,
                "Segment {} is full", self.segment_number
            );
            return Ok(false);
        }

        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .map_err(|e| Error::storage("write to segment", &self.path, &e))?;
        self.line_count += 1;
        Ok(true)
    }

    /// Flush any buffered bytes to the file.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::storage("flush segment", &self.path, &e))
    }

    /// Assign the start time explicitly.
    pub fn set_start_time(&mut self, at: DateTime<Utc>) {
        self.start_time = Some(at);
    }

    /// Assign the current time as start time and return it.
    pub fn mark_started(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.start_time = Some(now);
        now
    }

    /// Mark the segment finished and return the elapsed time.
    ///
    /// # Errors
    ///
    /// [`StateError::AlreadyFinished`] if called twice and
    /// [`StateError::NotStarted`] if no start time was assigned. Neither
    /// changes the segment.
    pub fn finish(&mut self) -> std::result::Result<TimeDelta, StateError> {
        if self.finished {
            let err = StateError::AlreadyFinished {
                batch: self.batch_number,
                segment: self.segment_number,
            };
            warn!(parent: &self.span, "{err}");
            return Err(err);
        }
        let Some(start) = self.start_time else {
            let err = StateError::NotStarted {
                batch: self.batch_number,
                segment: self.segment_number,
            };
            error!(parent: &self.span, "{err}");
            return Err(err);
        };

        let end = Utc::now();
        let elapsed = end - start;
        self.end_time = Some(end);
        self.elapsed = Some(elapsed);
        self.finished = true;
        info!(
            parent: &self.span,
            lines = self.line_count,
            elapsed_ms = elapsed.num_milliseconds(),
            "Segment {} of batch {} finished", self.segment_number, self.batch_number
        );
        Ok(elapsed)
    }

    /// Batch this segment belongs to.
    #[must_use]
    pub const fn batch_number(&self) -> u64 {
        self.batch_number
    }

    /// Position of this segment within its batch, starting at 1.
    #[must_use]
    pub const fn segment_number(&self) -> u32 {
        self.segment_number
    }

    /// Path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written so far.
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.line_count
    }

    /// Maximum number of lines.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the next write will be refused.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.line_count >= self.capacity
    }

    /// Start time, if assigned.
    #[must_use]
    pub const fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// End time, once finished.
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Time between start and finish, once finished.
    #[must_use]
    pub const fn elapsed(&self) -> Option<TimeDelta> {
        self.elapsed
    }

    /// Whether [`finish`](Self::finish) has succeeded.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}
