//! batchkeep CLI - resumable batch state for web crawls
//!
//! Thin entry point; argument parsing and command dispatch live in the
//! library so integration tests and the binary share one code path.

fn main() -> anyhow::Result<()> {
    batchkeep_cli::run()
}
