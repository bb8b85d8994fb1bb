#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// Isolated data root plus an empty config file for one test.
pub struct Workspace {
    dir: TempDir,
}

#[allow(dead_code)]
impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create test workspace");
        fs::write(dir.path().join("config.toml"), "").expect("failed to write config");
        fs::create_dir(dir.path().join("data")).expect("failed to create data root");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_root(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn staging(&self) -> PathBuf {
        self.data_root().join("staging")
    }

    /// `batchkeep` command bound to this workspace's config and data root.
    pub fn cmd(&self) -> Command {
        let mut cmd = batchkeep_cmd();
        cmd.env("BATCHKEEP_CONFIG", self.root().join("config.toml"));
        cmd.env("BATCHKEEP_DATA_ROOT", self.data_root());
        cmd
    }

    pub fn write_input(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.root().join(name);
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&path, content).expect("failed to write input");
        path
    }
}

/// Create a `batchkeep` command with colors and inherited settings disabled.
#[allow(dead_code)]
pub fn batchkeep_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("batchkeep"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env_remove("BATCHKEEP_CONFIG");
    cmd.env_remove("BATCHKEEP_DATA_ROOT");
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Today's batch folder name for `number`.
#[allow(dead_code)]
pub fn today_folder(number: u64) -> String {
    format!("{}_batch_{number}", chrono::Local::now().format("%Y%m%d"))
}
