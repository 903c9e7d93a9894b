//! Common test utilities for bugtrack integration tests.
//!
//! Provides `TestEnv` for isolated environments that never read the user's
//! secrets file, never write to the user's audit log, and point at a
//! MongoDB address where nothing listens.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A connection string nothing answers on.
pub const UNREACHABLE_URI: &str = "mongodb://127.0.0.1:1/";

/// Probe budget used by integration tests, in milliseconds.
pub const TEST_PROBE_TIMEOUT_MS: &str = "300";

/// A test environment with isolated directories.
///
/// - `repo_dir`: working directory for `bt` (and its `.bugtrack/` folder)
/// - `home_dir`: HOME and XDG directories, so no user config leaks in
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub home_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            home_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the bt binary with an unreachable store.
    pub fn bt(&self) -> Command {
        let home = self.home_dir.path();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bt"));
        cmd.current_dir(self.repo_dir.path());
        cmd.env("HOME", home);
        cmd.env("XDG_CONFIG_HOME", home.join(".config"));
        cmd.env("XDG_DATA_HOME", home.join(".local/share"));
        cmd.env("BUGTRACK_SECRETS", home.join("no-secrets.toml"));
        cmd.env("BUGTRACK_AUDIT_LOG", self.audit_log_path());
        cmd.env("MONGO_URI", UNREACHABLE_URI);
        cmd.env("BUGTRACK_PROBE_TIMEOUT_MS", TEST_PROBE_TIMEOUT_MS);
        cmd.env_remove("MONGO_DB");
        cmd.env_remove("BUGTRACK_LOG");
        cmd.env_remove("BT_REPO");
        cmd
    }

    /// Write `.bugtrack/secrets.toml` in the repo directory and return its path.
    pub fn write_secrets(&self, contents: &str) -> PathBuf {
        let dir = self.repo_dir.path().join(".bugtrack");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("secrets.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn repo_path(&self) -> &Path {
        self.repo_dir.path()
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.home_dir.path().join("audit.log")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Split captured stderr into lines.
pub fn stderr_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::to_string)
        .collect()
}
