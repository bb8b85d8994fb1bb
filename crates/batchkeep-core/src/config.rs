//! Configuration management for batchkeep.
//!
//! Configuration is stored in TOML and layered as:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A config file: `BATCHKEEP_CONFIG` if set, otherwise `config.toml` in the
//!    platform config directory
//! 3. Environment overrides: `BATCHKEEP_DATA_ROOT`
//!
//! ## Example Configuration File
//!
//! ```toml
//! [paths]
//! data_root = "/srv/crawl/data"
//!
//! [batch]
//! segment_capacity = 100000
//! visited_file = "visited_articles.txt"
//! failed_file = "failed_articles.txt"
//!
//! [discovery]
//! enabled = false
//! max_levels = 4
//! search_depth = 3
//! markers = ["LICENSE", "README.md", "requirements.txt", "Cargo.toml"]
//! data_dir_name = "data"
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "BATCHKEEP_CONFIG";
/// Environment variable overriding `paths.data_root`.
pub const DATA_ROOT_ENV: &str = "BATCHKEEP_DATA_ROOT";

/// Default number of records per result segment.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 100_000;
/// Default file name of the visited ledger.
pub const DEFAULT_VISITED_FILE: &str = "visited_articles.txt";
/// Default file name of the failed ledger.
pub const DEFAULT_FAILED_FILE: &str = "failed_articles.txt";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Per-batch layout and limits.
    pub batch: BatchConfig,
    /// Optional data-root discovery.
    pub discovery: DiscoveryConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the `staging` folder.
    ///
    /// When unset the data root must be passed explicitly or discovered.
    pub data_root: Option<PathBuf>,
}

/// Per-batch layout and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum records per result segment before rolling over.
    pub segment_capacity: usize,
    /// File name of the visited ledger inside each batch folder.
    pub visited_file: String,
    /// File name of the failed ledger inside each batch folder.
    pub failed_file: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            visited_file: DEFAULT_VISITED_FILE.to_string(),
            failed_file: DEFAULT_FAILED_FILE.to_string(),
        }
    }
}

/// Settings for locating a data root when none is configured.
///
/// Discovery depends on the working directory, so it is off unless enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Whether discovery may be used at all.
    pub enabled: bool,
    /// Number of directory levels (starting at the working directory) to try.
    pub max_levels: usize,
    /// Depth below each candidate directory that is searched.
    pub search_depth: usize,
    /// File names that mark a project root.
    pub markers: Vec<String>,
    /// Name of the data directory to find or create below the project root.
    pub data_dir_name: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_levels: 4,
            search_depth: 3,
            markers: vec![
                "LICENSE".to_string(),
                "README.md".to_string(),
                "requirements.txt".to_string(),
                "Cargo.toml".to_string(),
            ],
            data_dir_name: "data".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults.
    ///
    /// Environment overrides are applied and the result is validated.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Load configuration from `explicit`, which must exist, or else from the
    /// default location when present.
    ///
    /// Environment overrides are applied and the result is validated.
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file.
    ///
    /// Missing sections and fields take their default values.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config '{}': {e}", path.display()))
        })
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// Path of the default config file, if one can be determined.
    ///
    /// `BATCHKEEP_CONFIG` wins over the platform config directory.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        directories::ProjectDirs::from("dev", "batchkeep", "batchkeep")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply `BATCHKEEP_DATA_ROOT` if it is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
            let trimmed = root.trim();
            if !trimmed.is_empty() {
                self.paths.data_root = Some(PathBuf::from(trimmed));
            }
        }
    }

    /// Reject settings the batch manager cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch.segment_capacity == 0 {
            return Err(Error::Config(
                "batch.segment_capacity must be at least 1".into(),
            ));
        }
        validate_ledger_file_name("batch.visited_file", &self.batch.visited_file)?;
        validate_ledger_file_name("batch.failed_file", &self.batch.failed_file)?;
        if self.batch.visited_file == self.batch.failed_file {
            return Err(Error::Config(format!(
                "batch.visited_file and batch.failed_file must differ (both are '{}')",
                self.batch.visited_file
            )));
        }
        if self.discovery.max_levels == 0 {
            return Err(Error::Config(
                "discovery.max_levels must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn validate_ledger_file_name(field: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Config(format!("{field} cannot be empty")));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::Config(format!(
            "{field} '{name}' must be a plain file name"
        )));
    }
    Ok(())
}
