//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

/// Returns the path to a workspace binary, resolving relative to the test
/// binary itself so it works from any target layout.
pub fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where pabot and pabotd are built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// A `pabot` invocation rooted in its own temp directory.
pub struct PabotRun {
    pub dir: tempfile::TempDir,
}

impl PabotRun {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file under the run directory.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).expect("write file");
        path
    }

    /// Build a `pabot` command with cwd inside the run directory.
    pub fn pabot(&self) -> Command {
        let mut cmd = Command::new(binary_path("pabot"));
        cmd.current_dir(self.path());
        cmd
    }

    /// Arguments selecting a trivial fake runner: a shell script that gets
    /// the whole synthesized command line and just runs `script`.
    pub fn fake_runner_args(script: &str) -> Vec<String> {
        vec![
            "--command".to_string(),
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "--end-command".to_string(),
        ]
    }
}
