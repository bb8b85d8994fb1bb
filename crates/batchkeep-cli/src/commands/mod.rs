//! Command implementations for the batchkeep CLI.

mod ingest;
mod new;
mod status;

pub use ingest::execute as ingest;
pub use new::execute as new_batch;
pub use status::execute as status;

use std::path::PathBuf;

use batchkeep_core::BatchRequest;
use tracing::{Span, field, info_span};

/// Build the request for a new batch from CLI arguments.
fn batch_request(previous: Option<PathBuf>, data_root: Option<PathBuf>) -> BatchRequest {
    BatchRequest {
        previous_batch_folder: previous,
        data_root,
    }
}

/// Root span for one batch; the number is recorded once known.
fn batch_span() -> Span {
    info_span!("batch", number = field::Empty)
}
