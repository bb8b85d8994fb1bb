//! Configuration resolution for CLI invocations.

use anyhow::{Context, Result};
use batchkeep_core::Config;

use crate::cli::Cli;

/// Load the effective configuration for this invocation.
///
/// An explicit `--config` file must exist; otherwise the default location
/// is used when present. Environment overrides and validation run once,
/// then `--data-root` overrides `paths.data_root`.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_with(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from '{}'", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    if let Some(root) = &cli.data_root {
        config.paths.data_root = Some(root.clone());
    }
    Ok(config)
}
