// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery cache persistence (`.pabotsuitenames`).
//!
//! Layout: four fingerprint lines (source paths, command, flags, datafile),
//! then the plan body in the ordering grammar. A header mismatch invalidates
//! the whole cache. Writes are atomic (temp file + rename) so a crash never
//! leaves a truncated cache behind.

use crate::parser::{parse_items, render_items, PlanError};
use pabot_core::PlanItem;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// The four fingerprint header lines, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    pub source_paths: String,
    pub command: String,
    pub flags: String,
    pub datafile: String,
}

impl Fingerprints {
    /// Compute fingerprints over the current inputs.
    ///
    /// Each line is the SHA-256 hex digest of a newline-joined field list,
    /// so reordering inputs changes the fingerprint but formatting does not.
    pub fn compute(
        source_paths: &[String],
        command: &[String],
        flags: &[String],
        datafile: &str,
    ) -> Self {
        Self {
            source_paths: digest_of(source_paths),
            command: digest_of(command),
            flags: digest_of(flags),
            datafile: digest_of(&[datafile.to_string()]),
        }
    }
}

fn digest_of(fields: &[String]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// A loaded or to-be-written discovery cache.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    pub fingerprints: Fingerprints,
    pub items: Vec<PlanItem>,
}

impl DiscoveryCache {
    pub fn new(fingerprints: Fingerprints, items: Vec<PlanItem>) -> Self {
        Self {
            fingerprints,
            items,
        }
    }

    /// Load a cache if present and well-formed.
    ///
    /// Returns `Ok(None)` when the file does not exist or its header is
    /// truncated; discovery then regenerates it. A body that fails to parse
    /// is an error: the file exists but someone broke it, and silently
    /// rediscovering would hide that.
    pub fn load(path: &Path) -> Result<Option<Self>, CacheError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines();
        let header: Vec<&str> = lines.by_ref().take(4).collect();
        if header.len() < 4 {
            warn!(path = %path.display(), "cache header truncated, ignoring cache");
            return Ok(None);
        }
        let fingerprints = Fingerprints {
            source_paths: header[0].to_string(),
            command: header[1].to_string(),
            flags: header[2].to_string(),
            datafile: header[3].to_string(),
        };
        let body: String = lines.map(|l| format!("{l}\n")).collect();
        let items = parse_items(&body)?;
        Ok(Some(Self {
            fingerprints,
            items,
        }))
    }

    /// True when every header fingerprint matches the given inputs.
    pub fn is_valid_for(&self, current: &Fingerprints) -> bool {
        self.fingerprints == *current
    }

    /// Render header + body to the persisted text form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.fingerprints.source_paths);
        out.push('\n');
        out.push_str(&self.fingerprints.command);
        out.push('\n');
        out.push_str(&self.fingerprints.flags);
        out.push('\n');
        out.push_str(&self.fingerprints.datafile);
        out.push('\n');
        out.push_str(&render_items(&self.items));
        out
    }

    /// Save the cache atomically (write to .tmp, sync, then rename).
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(self.render().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
