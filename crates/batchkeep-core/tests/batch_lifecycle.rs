//! End-to-end batch runs across several batches in one data root.

#![allow(clippy::unwrap_used)]

use batchkeep_core::segment::segment_file_name;
use batchkeep_core::{
    BatchCoordinator, BatchMetadata, BatchRequest, Config, Error, PageRecord, StateError,
    list_batches,
};
use chrono::Local;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::Span;

fn config(capacity: usize) -> Config {
    let mut config = Config::default();
    config.batch.segment_capacity = capacity;
    config
}

fn today(number: u64) -> String {
    format!("{}_batch_{number}", Local::now().format("%Y%m%d"))
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn resumes_from_previous_batch_folder() {
    let temp = TempDir::new().unwrap();
    let previous = temp.path().join("staging").join("20240101_batch_3");
    fs::create_dir_all(&previous).unwrap();
    fs::write(previous.join("visited_articles.txt"), "Amsterdam\nRotterdam\n").unwrap();
    fs::write(previous.join("failed_articles.txt"), "Atlantis\n").unwrap();

    let mut batch = BatchCoordinator::open(
        BatchRequest::from_previous(&previous),
        &config(100),
        Span::none(),
    )
    .unwrap();

    let root = std::path::absolute(temp.path()).unwrap();
    assert_eq!(batch.number(), 4);
    assert_eq!(batch.folder(), root.join("staging").join(today(4)));
    assert!(batch.should_skip("Amsterdam"));
    assert!(batch.should_skip("Atlantis"));

    // The seed is a copy; the previous batch is never written to.
    batch.start_run();
    batch
        .record_page(&PageRecord::new("Utrecht", true, None))
        .unwrap();
    batch.finish_run().unwrap();
    assert_eq!(
        lines(&previous.join("visited_articles.txt")),
        vec!["Amsterdam", "Rotterdam"]
    );
}

#[test]
fn consecutive_runs_carry_ledgers_forward() {
    let temp = TempDir::new().unwrap();
    let config = config(100);

    let mut first =
        BatchCoordinator::open(BatchRequest::in_data_root(temp.path()), &config, Span::none())
            .unwrap();
    first.start_run();
    for title in ["Leiden", "Delft"] {
        first
            .record_page(&PageRecord::new(title, true, Some(vec!["Holland".into()])))
            .unwrap();
    }
    first.record_failure("Nergens").unwrap();
    first.finish_run().unwrap();

    // A second batch on the same day gets a new number and folder.
    let mut second =
        BatchCoordinator::open(BatchRequest::in_data_root(temp.path()), &config, Span::none())
            .unwrap();
    assert_eq!(second.number(), 2);
    assert_eq!(second.previous_batch_folder(), Some(first.folder()));
    assert!(second.is_visited("Leiden"));
    assert!(second.is_visited("Delft"));
    assert!(second.has_failed("Nergens"));

    second.start_run();
    second
        .record_page(&PageRecord::new("Gouda", true, None))
        .unwrap();
    let metadata = second.finish_run().unwrap();
    assert_eq!(metadata.visited_count, 3);
    assert_eq!(metadata.failed_count, 1);
    assert_eq!(metadata.records_written, 1);

    let staging = temp.path().join("staging");
    let numbers: Vec<u64> = list_batches(&staging)
        .unwrap()
        .into_iter()
        .map(|entry| entry.number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[test]
fn finalize_compacts_ledger_and_keeps_backup() {
    let temp = TempDir::new().unwrap();
    let mut batch = BatchCoordinator::open(
        BatchRequest::in_data_root(temp.path()),
        &config(100),
        Span::none(),
    )
    .unwrap();
    batch.start_run();

    let page = PageRecord::new("Zwolle", true, None);
    batch.record_page(&page).unwrap();
    batch.record_page(&page).unwrap();
    batch.record_failure("Nergens").unwrap();
    batch.record_failure("Nergens").unwrap();

    let visited_path = batch.visited().path().to_path_buf();
    assert_eq!(lines(&visited_path), vec!["Zwolle", "Zwolle"]);

    batch.finish_run().unwrap();

    assert_eq!(lines(&visited_path), vec!["Zwolle"]);
    let backup = batch.folder().join("visited_articles_2.txt");
    assert_eq!(lines(&backup), vec!["Zwolle", "Zwolle"]);
    assert_eq!(
        lines(&batch.folder().join("failed_articles.txt")),
        vec!["Nergens"]
    );
    assert!(batch.folder().join("failed_articles_2.txt").is_file());
}

#[test]
fn rollover_splits_output_across_segments() {
    let temp = TempDir::new().unwrap();
    let mut batch = BatchCoordinator::open(
        BatchRequest::in_data_root(temp.path()),
        &config(2),
        Span::none(),
    )
    .unwrap();
    batch.start_run();

    let placed: Vec<u32> = ["A", "B", "C", "D", "E"]
        .into_iter()
        .map(|title| batch.record_page(&PageRecord::missing(title)).unwrap())
        .collect();
    assert_eq!(placed, vec![1, 1, 2, 2, 3]);

    let metadata = batch.finish_run().unwrap();
    let per_segment: Vec<usize> = metadata.segments.iter().map(|s| s.lines).collect();
    assert_eq!(per_segment, vec![2, 2, 1]);
    assert!(metadata.segments.iter().all(|s| s.finished_at.is_some()));

    let folder = batch.folder();
    assert_eq!(lines(&folder.join(segment_file_name(1, 1))).len(), 2);
    assert_eq!(lines(&folder.join(segment_file_name(1, 2))).len(), 2);
    let last = lines(&folder.join(segment_file_name(1, 3)));
    assert_eq!(
        last,
        vec![r#"{"title":"E","exists":false,"num_links":null,"links":null}"#]
    );
}

#[test]
fn finished_batch_rejects_further_work() {
    let temp = TempDir::new().unwrap();
    let mut batch = BatchCoordinator::open(
        BatchRequest::in_data_root(temp.path()),
        &config(10),
        Span::none(),
    )
    .unwrap();
    batch.start_run();
    let metadata = batch.finish_run().unwrap();

    assert!(matches!(
        batch.finish_run(),
        Err(Error::State(StateError::BatchAlreadyFinished))
    ));
    assert!(batch.record_failure("late").unwrap_err().is_state());
    assert!(batch.rotate_segment().unwrap_err().is_state());

    let saved = BatchMetadata::load(batch.folder()).unwrap().unwrap();
    assert_eq!(saved, metadata);
}

#[test]
fn interrupted_run_is_picked_up_by_next_batch() {
    let temp = TempDir::new().unwrap();
    let config = config(10);

    {
        let mut crashed =
            BatchCoordinator::open(BatchRequest::in_data_root(temp.path()), &config, Span::none())
                .unwrap();
        crashed.start_run();
        crashed
            .record_page(&PageRecord::new("Haarlem", true, None))
            .unwrap();
        // Dropped without finish_run.
    }

    let next =
        BatchCoordinator::open(BatchRequest::in_data_root(temp.path()), &config, Span::none())
            .unwrap();
    assert_eq!(next.number(), 2);
    assert!(next.is_visited("Haarlem"));
    let previous = next.previous_batch_folder().unwrap();
    assert!(BatchMetadata::load(previous).unwrap().is_none());
}
