//! # batchkeep-core
//!
//! Resumable batch state for web crawls.
//!
//! A crawl is split into numbered batches stored under
//! `<data_root>/staging/<YYYYMMDD>_batch_<N>/`. Each batch carries forward
//! the visited and failed ledgers of the one before it, so a new run never
//! re-fetches a page that was already handled, and caps its output into
//! fixed-size result segments.
//!
//! ## Architecture
//!
//! - **Ledger**: durable key set mirrored to a text file, finalized once
//! - **`ResultSegment`**: one capacity-bounded `.jsonl` output file
//! - **`BatchCoordinator`**: batch numbering, folder layout, ledger seeding
//!   and segment rollover
//! - **`BatchMetadata`**: summary saved when a run finishes
//! - **Configuration** and optional data-root discovery
//!
//! ## Quick Start
//!
//! ```rust
//! use batchkeep_core::{BatchCoordinator, BatchRequest, Config, PageRecord};
//! use tracing::Span;
//!
//! let data_root = tempfile::tempdir()?;
//! let config = Config::default();
//!
//! let mut batch =
//!     BatchCoordinator::open(BatchRequest::in_data_root(data_root.path()), &config, Span::none())?;
//! batch.start_run();
//! batch.record_page(&PageRecord::new("Utrecht", true, Some(vec!["Nederland".into()])))?;
//! batch.record_failure("Nergens")?;
//! let metadata = batch.finish_run()?;
//!
//! assert_eq!(metadata.batch_number, 1);
//! assert_eq!(metadata.records_written, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Logging
//!
//! Components never install a subscriber. Each one takes a [`tracing::Span`]
//! when opened and parents its events to it; pass [`Span::none`](tracing::Span::none)
//! to silence a component.

/// Batch numbering and staging folder scans
pub mod batch;
/// Configuration loading, defaults and validation
pub mod config;
/// Batch lifecycle orchestration
pub mod coordinator;
/// Project-root and data-root discovery
pub mod data_root;
/// Error types and result aliases
pub mod error;
/// Durable deduplication ledgers
pub mod ledger;
/// Batch summary persistence
pub mod metadata;
/// Page records and their JSON lines
pub mod page;
/// Capacity-bounded result files
pub mod segment;

// Re-export commonly used types
pub use batch::{Batch, BatchEntry, STAGING_DIR, latest_batch, list_batches};
pub use config::{BatchConfig, Config, DiscoveryConfig, PathsConfig};
pub use coordinator::{BatchCoordinator, BatchRequest};
pub use data_root::resolve_data_root;
pub use error::{Error, Result, StateError};
pub use ledger::Ledger;
pub use metadata::{BatchMetadata, METADATA_FILE, SegmentMetadata};
pub use page::{PageRecord, PageType};
pub use segment::{ResultSegment, segment_file_name};
