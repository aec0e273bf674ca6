// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution configuration consumed by discovery, the scheduler, and the
//! worker driver.

use std::path::PathBuf;
use std::time::Duration;

/// Directory holding per-unit scratch/output directories.
pub const RESULTS_DIR: &str = "pabot_results";

/// Default artifact extensions collected from worker output directories.
pub const DEFAULT_ARTIFACT_EXTENSIONS: &[&str] = &["png"];

/// Everything the engine needs to run a plan.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Worker pool size.
    pub processes: usize,
    /// Base runner invocation (`["robot"]` unless overridden with
    /// `--command ... --end-command`).
    pub command: Vec<String>,
    /// Runner-native arguments and data sources, passed through verbatim.
    pub runner_args: Vec<String>,
    /// Scratch directory for per-unit outputs.
    pub results_dir: PathBuf,
    /// Consolidated output directory.
    pub output_dir: PathBuf,
    /// Per-process timeout; `None` means unlimited.
    pub process_timeout: Option<Duration>,
    /// Artifact file extensions to collect (without dots).
    pub artifacts: Vec<String>,
    /// Recurse into subfolders when collecting artifacts.
    pub artifacts_in_subfolders: bool,
    /// Coordination server URI advertised to workers; empty when disabled.
    pub lib_uri: String,
    /// Argument files, in flag order (`--argumentfileN`).
    pub argument_files: Vec<PathBuf>,
    /// Skip merging, leave per-unit outputs in place.
    pub no_rebot: bool,
    pub verbose: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            processes: default_processes(),
            command: vec!["robot".to_string()],
            runner_args: Vec::new(),
            results_dir: PathBuf::from(RESULTS_DIR),
            output_dir: PathBuf::from("."),
            process_timeout: None,
            artifacts: DEFAULT_ARTIFACT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            artifacts_in_subfolders: false,
            lib_uri: String::new(),
            argument_files: Vec::new(),
            no_rebot: false,
            verbose: false,
        }
    }
}

impl ExecutionConfig {
    /// Per-unit output directory for a queue index.
    pub fn unit_dir(&self, queue_index: usize) -> PathBuf {
        self.results_dir.join(queue_index.to_string())
    }
}

/// Default worker budget: `min(2, cpu_count)`.
pub fn default_processes() -> usize {
    num_cpus::get().min(2).max(1)
}
