// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource file loading.
//!
//! INI-like syntax: each `[section]` becomes a value set named after the
//! section; a `tags` key (comma-separated) becomes its tag set; every other
//! `key = value` line becomes a value. Duplicate section names are allowed
//! and form distinct sets.

use indexmap::IndexMap;
use std::path::Path;
use thiserror::Error;

/// Errors from resource file parsing
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line_no}: key/value pair outside any [section]")]
    ValueOutsideSection { line_no: usize },

    #[error("line {line_no}: expected 'key = value': {text}")]
    MalformedLine { line_no: usize, text: String },

    #[error("line {line_no}: empty section name")]
    EmptySectionName { line_no: usize },
}

/// One parsed value set definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSetDef {
    pub name: String,
    pub tags: Vec<String>,
    pub values: IndexMap<String, String>,
}

/// Read and parse a resource file.
pub fn load_resource_file(path: &Path) -> Result<Vec<ValueSetDef>, ResourceError> {
    parse_resource_file(&std::fs::read_to_string(path)?)
}

/// Parse resource file text into value set definitions, in file order.
pub fn parse_resource_file(text: &str) -> Result<Vec<ValueSetDef>, ResourceError> {
    let mut sets: Vec<ValueSetDef> = Vec::new();
    let mut current: Option<ValueSetDef> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            if name.is_empty() {
                return Err(ResourceError::EmptySectionName { line_no });
            }
            if let Some(done) = current.take() {
                sets.push(done);
            }
            current = Some(ValueSetDef {
                name: name.to_string(),
                tags: Vec::new(),
                values: IndexMap::new(),
            });
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ResourceError::MalformedLine {
                line_no,
                text: line.to_string(),
            });
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(ResourceError::MalformedLine {
                line_no,
                text: line.to_string(),
            });
        }

        let set = current
            .as_mut()
            .ok_or(ResourceError::ValueOutsideSection { line_no })?;
        if key.eq_ignore_ascii_case("tags") {
            set.tags = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        } else {
            set.values.insert(key.to_string(), value.to_string());
        }
    }

    if let Some(done) = current.take() {
        sets.push(done);
    }
    Ok(sets)
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
