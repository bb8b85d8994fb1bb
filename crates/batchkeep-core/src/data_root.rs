//! Optional discovery of a data root from the working directory.
//!
//! A project root is the shallowest directory containing one of the marker
//! files, searched at the start directory and then at each ancestor up to
//! `max_levels` levels. Every search is bounded by `search_depth`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{Span, debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::{Config, DiscoveryConfig};
use crate::{Error, Result};

/// Locate a project root starting at `start`.
///
/// Returns `None` when no directory within the searched levels holds a
/// marker file.
#[must_use]
pub fn find_project_root(start: &Path, config: &DiscoveryConfig) -> Option<PathBuf> {
    let mut current = Some(start);
    for _ in 0..config.max_levels {
        let dir = current?;
        if let Some(found) = shallowest(dir, config.search_depth, |entry| {
            config
                .markers
                .iter()
                .any(|marker| entry.path().join(marker).is_file())
        }) {
            return Some(found);
        }
        current = dir.parent();
    }
    None
}

/// Find the data directory below the project root, or create it.
///
/// # Errors
///
/// [`Error::Config`] when no project root is found and [`Error::Storage`]
/// when the directory cannot be created.
pub fn find_or_create_data_root(
    start: &Path,
    config: &DiscoveryConfig,
    span: &Span,
) -> Result<PathBuf> {
    let start = std::path::absolute(start)?;
    let root = find_project_root(&start, config).ok_or_else(|| {
        Error::Config(format!(
            "No project root found within {} levels of '{}' (markers: {})",
            config.max_levels,
            start.display(),
            config.markers.join(", ")
        ))
    })?;
    debug!(parent: span, "Project root found at '{}'", root.display());

    let name = config.data_dir_name.as_str();
    if let Some(found) = shallowest(&root, config.search_depth, |entry| {
        entry.depth() > 0 && entry.file_name() == name
    }) {
        info!(parent: span, "Data folder found at: '{}'", found.display());
        return Ok(found);
    }

    let created = root.join(name);
    fs::create_dir_all(&created)
        .map_err(|e| Error::storage("create data folder", &created, &e))?;
    info!(parent: span, "No data folder found, created one at: '{}'", created.display());
    Ok(created)
}

/// Resolve the data root for a new or inspected batch.
///
/// An explicit root wins, then `paths.data_root`, then discovery from the
/// working directory when `discovery.enabled` is set.
///
/// # Errors
///
/// [`Error::Config`] when no source yields a data root.
pub fn resolve_data_root(explicit: Option<&Path>, config: &Config, span: &Span) -> Result<PathBuf> {
    if let Some(root) = explicit.or(config.paths.data_root.as_deref()) {
        return Ok(root.to_path_buf());
    }
    if config.discovery.enabled {
        let cwd = std::env::current_dir()?;
        return find_or_create_data_root(&cwd, &config.discovery, span);
    }
    Err(Error::Config(
        "No data root: pass a data root, set paths.data_root or enable discovery".into(),
    ))
}

/// Shallowest directory under `dir` (inclusive) accepted by `pred`.
///
/// Entries are visited in name order, so ties go to the first name.
fn shallowest(dir: &Path, depth: usize, pred: impl Fn(&DirEntry) -> bool) -> Option<PathBuf> {
    WalkDir::new(dir)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| pred(entry))
        .min_by_key(DirEntry::depth)
        .map(DirEntry::into_path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> DiscoveryConfig {
        DiscoveryConfig {
            enabled: true,
            ..DiscoveryConfig::default()
        }
    }

    #[test]
    fn test_root_found_in_start_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README.md"), "# project").unwrap();

        assert_eq!(
            find_project_root(temp.path(), &config()),
            Some(temp.path().to_path_buf())
        );
    }

    #[test]
    fn test_root_found_in_ancestor() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("LICENSE"), "MIT").unwrap();
        let nested = temp.path().join("src").join("crawler");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_project_root(&nested, &config()),
            Some(temp.path().to_path_buf())
        );
    }

    #[test]
    fn test_root_search_is_bounded_by_levels() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("LICENSE"), "MIT").unwrap();
        let nested = temp.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        let mut bounded = config();
        bounded.max_levels = 2;
        bounded.markers = vec!["LICENSE".into()];
        assert_eq!(find_project_root(&nested, &bounded), None);

        bounded.max_levels = 4;
        assert_eq!(
            find_project_root(&nested, &bounded),
            Some(temp.path().to_path_buf())
        );
    }

    #[test]
    fn test_shallowest_marker_wins() {
        let temp = TempDir::new().unwrap();
        let deep = temp.path().join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("README.md"), "").unwrap();
        fs::create_dir(temp.path().join("z")).unwrap();
        fs::write(temp.path().join("z").join("README.md"), "").unwrap();

        assert_eq!(
            find_project_root(temp.path(), &config()),
            Some(temp.path().join("z"))
        );
    }

    #[test]
    fn test_existing_data_folder_is_reused() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Cargo.toml"), "").unwrap();
        let data = temp.path().join("output").join("data");
        fs::create_dir_all(&data).unwrap();

        let found = find_or_create_data_root(temp.path(), &config(), &Span::none()).unwrap();
        assert_eq!(found, data);
    }

    #[test]
    fn test_data_folder_created_under_root() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("requirements.txt"), "").unwrap();

        let created = find_or_create_data_root(temp.path(), &config(), &Span::none()).unwrap();
        assert_eq!(created, temp.path().join("data"));
        assert!(created.is_dir());
    }

    #[test]
    fn test_no_project_root_is_config_error() {
        let temp = TempDir::new().unwrap();
        let mut cfg = config();
        cfg.max_levels = 1;
        cfg.markers = vec!["no-such-marker.lock".into()];

        let err = find_or_create_data_root(temp.path(), &cfg, &Span::none()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_resolve_prefers_explicit_root() {
        let mut cfg = Config::default();
        cfg.paths.data_root = Some(PathBuf::from("/from/config"));

        let explicit = resolve_data_root(Some(Path::new("/explicit")), &cfg, &Span::none());
        assert_eq!(explicit.unwrap(), PathBuf::from("/explicit"));

        let configured = resolve_data_root(None, &cfg, &Span::none());
        assert_eq!(configured.unwrap(), PathBuf::from("/from/config"));
    }

    #[test]
    fn test_resolve_without_any_source_fails() {
        let err = resolve_data_root(None, &Config::default(), &Span::none()).unwrap_err();
        assert!(err.is_configuration());
    }
}
