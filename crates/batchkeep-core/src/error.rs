//! Error types and handling for batchkeep-core operations.
//!
//! Errors fall into three groups that callers treat differently:
//!
//! - **Configuration errors** ([`Error::InvalidBatchFolder`], [`Error::Config`]):
//!   the batch cannot be set up as requested. Not recoverable; fix the input.
//! - **I/O errors** ([`Error::Io`], [`Error::Storage`], [`Error::Serialization`]):
//!   a filesystem operation failed. Fatal to the operation attempted and
//!   never retried internally.
//! - **Record errors** ([`Error::InvalidRecord`]): a ledger key or result
//!   line that the line-oriented file formats cannot hold. Nothing is written.
//! - **State errors** ([`Error::State`] wrapping [`StateError`]): an invalid
//!   lifecycle transition such as finishing a segment twice. These are soft:
//!   the component is left untouched and stays usable.
//!
//! ```rust
//! use batchkeep_core::{Error, StateError};
//!
//! let err = Error::from(StateError::LedgerAlreadyFinalized);
//! assert!(err.is_state());
//! assert_eq!(err.category(), "state");
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for batchkeep-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// The underlying `std::io::Error` is preserved so callers can inspect
    /// the kind (for example `AlreadyExists` when a batch folder races).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A filesystem operation failed on a specific path.
    ///
    /// Like [`Error::Io`] but carries the path and the step that failed so
    /// the message is actionable without a backtrace.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The previous batch folder does not follow the batch naming scheme.
    #[error(
        "Invalid previous batch folder '{}': expected a name matching '{pattern}'",
        path.display()
    )]
    InvalidBatchFolder {
        /// Folder that was supplied.
        path: PathBuf,
        /// Pattern the trailing path segment must match.
        pattern: &'static str,
    },

    /// Configuration is invalid, incomplete or unreadable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed (JSON or TOML).
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A ledger key or result line cannot be stored one per line.
    #[error("Invalid record {value:?}: {reason}")]
    InvalidRecord {
        /// Offending key or line.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// An invalid lifecycle transition was rejected.
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Rejected lifecycle transitions.
///
/// Returned directly by [`ResultSegment::finish`](crate::ResultSegment::finish)
/// and wrapped in [`Error::State`] by operations that can also fail on I/O.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The segment was already finished.
    #[error("segment {segment} of batch {batch} is already finished")]
    AlreadyFinished {
        /// Batch number.
        batch: u64,
        /// Segment number.
        segment: u32,
    },

    /// The segment has no start time and cannot be finished.
    #[error("segment {segment} of batch {batch} has not been started")]
    NotStarted {
        /// Batch number.
        batch: u64,
        /// Segment number.
        segment: u32,
    },

    /// The ledger was already finalized for this batch.
    #[error("ledger has already been finalized")]
    LedgerAlreadyFinalized,

    /// The batch run was already finished.
    #[error("batch run has already been finished")]
    BatchAlreadyFinished,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Build a [`Error::Storage`] that names the failing step and path.
    pub(crate) fn storage(action: &str, path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Storage(format!("Failed to {action} '{}': {err}", path.display()))
    }

    /// Check if the error might succeed when the operation is retried.
    ///
    /// Nothing in this crate retries on its own; this only informs callers.
    /// Interrupted and timed-out I/O count as recoverable, state errors are
    /// recoverable because the component is unchanged.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            Self::State(_) => true,
            _ => false,
        }
    }

    /// Whether this is a soft lifecycle error.
    #[must_use]
    pub const fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }

    /// Whether this error means the batch could not be configured.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidBatchFolder { .. } | Self::Config(_))
    }

    /// Get the error category as a string identifier for logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Storage(_) => "storage",
            Self::InvalidBatchFolder { .. } | Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::InvalidRecord { .. } => "record",
            Self::State(_) => "state",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
