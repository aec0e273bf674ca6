// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact collection.
//!
//! After a worker exits, files matching the configured extensions are copied
//! from its output directory into the consolidated output directory, under a
//! subdirectory named by queue index so parallel workers never collide. The
//! recorded original → final relative path mapping drives the merger's
//! reference rewriting.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Original-relative → final-relative artifact paths, in copy order.
#[derive(Debug, Clone, Default)]
pub struct ArtifactMapping {
    pub entries: Vec<(String, String)>,
}

impl ArtifactMapping {
    pub fn extend(&mut self, other: ArtifactMapping) {
        self.entries.extend(other.entries);
    }
}

/// Copy matching artifacts from `worker_dir` into `dest_dir`.
///
/// Matching files keep their worker-relative path, prefixed with the queue
/// index: `screenshots/error.png` from queue 3 lands at
/// `3/screenshots/error.png`.
pub fn collect(
    worker_dir: &Path,
    dest_dir: &Path,
    queue_index: usize,
    extensions: &[String],
    recurse: bool,
) -> std::io::Result<ArtifactMapping> {
    let mut mapping = ArtifactMapping::default();
    if extensions.is_empty() || !worker_dir.is_dir() {
        return Ok(mapping);
    }

    let mut found = Vec::new();
    walk(worker_dir, worker_dir, extensions, recurse, &mut found)?;

    for original in found {
        let final_rel = PathBuf::from(queue_index.to_string()).join(&original);
        let dest = dest_dir.join(&final_rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(worker_dir.join(&original), &dest)?;
        debug!(from = %original.display(), to = %final_rel.display(), "collected artifact");
        mapping.entries.push((
            path_to_slashed(&original),
            path_to_slashed(&final_rel),
        ));
    }
    Ok(mapping)
}

fn walk(
    root: &Path,
    dir: &Path,
    extensions: &[String],
    recurse: bool,
    found: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    let mut names: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    // Deterministic copy order regardless of directory enumeration order
    names.sort();

    for path in names {
        if path.is_dir() {
            if recurse {
                walk(root, &path, extensions, recurse, found)?;
            }
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        if matches {
            if let Ok(rel) = path.strip_prefix(root) {
                found.push(rel.to_path_buf());
            }
        }
    }
    Ok(())
}

fn path_to_slashed(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
