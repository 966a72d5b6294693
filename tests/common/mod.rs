//! Common helpers for tspipe CLI tests.
//!
//! `TestProject` is an isolated project directory plus helpers to run the
//! `tspipe` binary inside it.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Result of running a tspipe CLI command
#[derive(Debug)]
pub struct TestResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Isolated project directory
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Write a file relative to the project root, creating parents
    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        self
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.path(relative)).ok()
    }

    pub fn run(&self, args: &[&str]) -> TestResult {
        self.run_with_env(args, &[])
    }

    /// Run tspipe from the project root. `TSPIPE_*` and color variables
    /// from the outer environment are cleared.
    pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> TestResult {
        run_in(self.root.path(), args, env)
    }
}

fn run_in(cwd: &Path, args: &[&str], env: &[(&str, &str)]) -> TestResult {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tspipe"));
    command
        .args(args)
        .current_dir(cwd)
        .env_remove("TSPIPE_TARGETS")
        .env_remove("TSPIPE_ADDONS")
        .env_remove("TSPIPE_OUT_DIR")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("Failed to run tspipe");
    TestResult {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}
