//! Durable deduplication ledgers.
//!
//! A [`Ledger`] is a set of opaque string keys (page titles, URLs, ...) kept
//! in memory for O(1) lookups and mirrored to a line-oriented text file in
//! the batch folder. Each batch starts from a byte-for-byte copy of the
//! previous batch's ledger, so a crash mid-batch loses at most the keys that
//! were added without `flush`.
//!
//! ## File format
//!
//! UTF-8 text, one key per line, LF terminated, no escaping. Blank lines are
//! ignored when loading, so keys that are blank or contain a line break are
//! rejected with [`Error::InvalidRecord`] before anything is written.
//!
//! ## Lifecycle
//!
//! ```text
//! open (copy or create) -> add / add_all ... -> finalize (once)
//! ```
//!
//! `finalize` moves the live file to `<stem>_<n>.txt` and rewrites the live
//! file from the in-memory set, which also drops duplicates that incremental
//! appends may have produced.
//!
//! The whole key set is held in memory; ledgers are expected to fit.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{Span, debug, info, warn};

use crate::{Error, Result, StateError};

/// A durable set of keys backed by a text file.
#[derive(Debug)]
pub struct Ledger {
    batch_folder: PathBuf,
    file_name: String,
    path: PathBuf,
    keys: HashSet<String>,
    backup_count: u32,
    finalized: bool,
    span: Span,
}

impl Ledger {
    /// Open the ledger `file_name` inside `batch_folder`.
    ///
    /// When `previous_batch_folder` holds a file with the same name it is
    /// copied byte-for-byte; otherwise an empty file is created. The
    /// resulting file is then loaded into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the copy, create or read fails.
    pub fn open(
        batch_folder: &Path,
        previous_batch_folder: Option<&Path>,
        file_name: &str,
        span: Span,
    ) -> Result<Self> {
        let path = batch_folder.join(file_name);

        let source = previous_batch_folder
            .map(|prev| prev.join(file_name))
            .filter(|source| source.is_file());

        if let Some(source) = &source {
            fs::copy(source, &path)
                .map_err(|e| Error::storage("copy previous ledger", source, &e))?;
            info!(
                parent: &span,
                "Copied ledger '{}' from previous batch",
                source.display()
            );
        } else {
            File::create(&path).map_err(|e| Error::storage("create ledger", &path, &e))?;
            info!(parent: &span, "No previous ledger found, created empty '{}'", file_name);
        }

        let keys = read_keys(&path)?;
        debug!(parent: &span, keys = keys.len(), "Loaded ledger '{}'", path.display());

        Ok(Self {
            batch_folder: batch_folder.to_path_buf(),
            file_name: file_name.to_string(),
            path,
            keys,
            backup_count: 1,
            finalized: false,
            span,
        })
    }

    /// Check that `key` survives a write and reload unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] for a blank key or one containing
    /// `\n` or `\r`.
    pub fn validate_key(key: &str) -> Result<()> {
        let reason = if key.contains(['\n', '\r']) {
            "ledger keys cannot contain line breaks"
        } else if key.trim().is_empty() {
            "ledger keys cannot be blank"
        } else {
            return Ok(());
        };
        Err(Error::InvalidRecord {
            value: key.to_string(),
            reason,
        })
    }

    /// Insert a key, returning `true` if it was not already present.
    ///
    /// With `flush` the key is appended to the live file immediately. The
    /// append happens even when the key is already known, so the file may
    /// hold duplicates until [`finalize`](Self::finalize) compacts it.
    pub fn add(&mut self, key: impl Into<String>, flush: bool) -> Result<bool> {
        let key = key.into();
        Self::validate_key(&key)?;
        if flush {
            self.append([key.as_str()])?;
        }
        Ok(self.keys.insert(key))
    }

    /// Insert several keys, returning how many were new.
    ///
    /// With `flush` every supplied key is appended in one write. One invalid
    /// key rejects the whole call.
    pub fn add_all<I, S>(&mut self, keys: I, flush: bool) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            Self::validate_key(key)?;
        }
        if flush && !keys.is_empty() {
            self.append(keys.iter().map(String::as_str))?;
        }
        let before = self.keys.len();
        self.keys.extend(keys);
        Ok(self.keys.len() - before)
    }

    /// Compact the ledger at the end of a batch.
    ///
    /// The fresh contents are written to a temporary file first, then the
    /// live file is renamed to the next free `<stem>_<n>.txt` (starting at
    /// `n = 2`) and the temporary file takes its place. Returns the backup
    /// path.
    ///
    /// If the temporary file cannot take the live file's place, the backup
    /// is moved back. Should that also fail, a retry finds no live file and
    /// reuses the backup made by the failed attempt.
    ///
    /// # Errors
    ///
    /// A second call returns [`StateError::LedgerAlreadyFinalized`] and leaves
    /// the files untouched. Filesystem failures return [`Error::Storage`].
    pub fn finalize(&mut self) -> Result<PathBuf> {
        if self.finalized {
            warn!(parent: &self.span, "Ledger '{}' is already finalized", self.file_name);
            return Err(StateError::LedgerAlreadyFinalized.into());
        }

        let tmp_path = self.path.with_extension("txt.tmp");
        self.write_snapshot(&tmp_path)?;

        let backup = if self.path.exists() {
            let backup = self.next_backup_path();
            fs::rename(&self.path, &backup)
                .map_err(|e| Error::storage("back up ledger", &self.path, &e))?;
            debug!(parent: &self.span, "Previous ledger backed up as '{}'", backup.display());
            backup
        } else {
            let backup = self.current_backup_path().ok_or_else(|| {
                Error::Storage(format!(
                    "Ledger '{}' is missing and has no backup",
                    self.path.display()
                ))
            })?;
            warn!(
                parent: &self.span,
                "Live ledger '{}' missing, keeping earlier backup '{}'",
                self.file_name,
                backup.display()
            );
            backup
        };

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            if let Err(restore) = fs::rename(&backup, &self.path) {
                warn!(
                    parent: &self.span,
                    "Could not restore '{}' from '{}': {restore}",
                    self.path.display(),
                    backup.display()
                );
            }
            return Err(Error::storage("commit ledger", &self.path, &e));
        }

        self.finalized = true;
        info!(
            parent: &self.span,
            keys = self.keys.len(),
            "Saved all keys to '{}'",
            self.path.display()
        );
        Ok(backup)
    }

    /// Whether `key` is in the ledger.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the ledger holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over the keys in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Path of the live ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the ledger inside its batch folder.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Number used by the most recent backup (1 before any backup).
    #[must_use]
    pub const fn backup_count(&self) -> u32 {
        self.backup_count
    }

    /// Whether [`finalize`](Self::finalize) has completed.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn append<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::storage("open ledger for append", &self.path, &e))?;
        let mut writer = BufWriter::new(file);
        let mut written = 0usize;
        for key in keys {
            writeln!(writer, "{key}")
                .map_err(|e| Error::storage("append to ledger", &self.path, &e))?;
            written += 1;
        }
        writer
            .flush()
            .map_err(|e| Error::storage("flush ledger", &self.path, &e))?;
        debug!(parent: &self.span, written, "Appended keys to '{}'", self.file_name);
        Ok(())
    }

    fn write_snapshot(&self, target: &Path) -> Result<()> {
        let mut sorted: Vec<&str> = self.keys().collect();
        sorted.sort_unstable();

        let file = File::create(target).map_err(|e| Error::storage("create", target, &e))?;
        let mut writer = BufWriter::new(file);
        for key in sorted {
            writeln!(writer, "{key}").map_err(|e| Error::storage("write", target, &e))?;
        }
        writer
            .flush()
            .map_err(|e| Error::storage("flush", target, &e))?;
        Ok(())
    }

    fn current_backup_path(&self) -> Option<PathBuf> {
        (self.backup_count > 1)
            .then(|| self.backup_path(self.backup_count))
            .filter(|path| path.is_file())
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let stem = self
            .file_name
            .split_once('.')
            .map_or(self.file_name.as_str(), |(stem, _)| stem);
        self.batch_folder.join(format!("{stem}_{n}.txt"))
    }

    fn next_backup_path(&mut self) -> PathBuf {
        loop {
            self.backup_count += 1;
            let candidate = self.backup_path(self.backup_count);
            if !candidate.exists() {
                return candidate;
            }
        }
    }
}

fn read_keys(path: &Path) -> Result<HashSet<String>> {
    let content =
        fs::read_to_string(path).map_err(|e| Error::storage("read ledger", path, &e))?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect())
}
