// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result consolidation.
//!
//! Stitches per-unit output XMLs into one `output.xml` under the
//! consolidated output directory. Re-executed units appear once, with the
//! latest attempt winning; argument-file variants are kept as siblings under
//! a synthetic parent suite. Relative artifact references in `log.html` and
//! `report.html` are rewritten via the collection mapping.
//!
//! The merge is deterministic: the same per-unit outputs always produce a
//! byte-identical consolidated file.

use crate::artifacts::ArtifactMapping;
use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while merging
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error in {path}: {message}")]
    Xml { path: String, message: String },

    #[error("missing or unreadable unit outputs: {}", paths.join(", "))]
    MissingOutputs { paths: Vec<String> },
}

/// One completed unit run to fold into the consolidated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInput {
    pub name: String,
    pub queue_index: usize,
    pub argfile: Option<usize>,
}

/// Consolidate per-unit outputs into `<output_dir>/output.xml` and rewrite
/// artifact references in `log.html`/`report.html`.
///
/// Merges what it can: broken inputs are reported in the returned error
/// after the consolidated file has been written.
pub fn merge(
    results_dir: &Path,
    output_dir: &Path,
    inputs: &[MergeInput],
    mapping: &ArtifactMapping,
) -> Result<PathBuf, MergeError> {
    // (name -> argfile variant -> suite fragment); later queue indexes
    // overwrite earlier ones, so a re-execution's latest attempt wins.
    let mut fragments: IndexMap<String, BTreeMap<Option<usize>, String>> = IndexMap::new();
    let mut broken: Vec<String> = Vec::new();

    let mut ordered: Vec<&MergeInput> = inputs.iter().collect();
    ordered.sort_by_key(|input| input.queue_index);

    for input in ordered {
        let path = results_dir
            .join(input.queue_index.to_string())
            .join("output.xml");
        match load_suite_fragment(&path) {
            Ok(fragment) => {
                fragments
                    .entry(input.name.clone())
                    .or_default()
                    .insert(input.argfile, fragment);
            }
            Err(e) => {
                warn!(unit = %input.name, path = %path.display(), error = %e, "unit output unusable");
                broken.push(path.display().to_string());
            }
        }
    }

    fs::create_dir_all(output_dir)?;
    let merged_path = output_dir.join("output.xml");
    fs::write(&merged_path, render_merged(&fragments))?;
    info!(path = %merged_path.display(), units = fragments.len(), "consolidated output written");

    rewrite_references(output_dir, mapping)?;

    if broken.is_empty() {
        Ok(merged_path)
    } else {
        Err(MergeError::MissingOutputs { paths: broken })
    }
}

/// Compose the consolidated document.
fn render_merged(fragments: &IndexMap<String, BTreeMap<Option<usize>, String>>) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<robot generator=\"pabot\">\n<suite name=\"Pabot\">\n");
    for (name, variants) in fragments {
        if variants.len() == 1 {
            if let Some(fragment) = variants.values().next() {
                out.push_str(fragment);
                out.push('\n');
            }
        } else {
            // Argument-file variants become siblings under a synthetic parent.
            out.push_str(&format!("<suite name=\"{}\">\n", escape_attr(name)));
            for (argfile, fragment) in variants {
                let label = match argfile {
                    Some(index) => format!("argumentfile {index}"),
                    None => "base".to_string(),
                };
                out.push_str(&format!("<suite name=\"{label}\">\n"));
                out.push_str(fragment);
                out.push_str("\n</suite>\n");
            }
            out.push_str("</suite>\n");
        }
    }
    out.push_str("</suite>\n</robot>\n");
    out
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

/// Read a unit output and slice out its top-level `<suite>` element.
fn load_suite_fragment(path: &Path) -> Result<String, MergeError> {
    let xml = fs::read_to_string(path)?;
    extract_suite_fragment(&xml).ok_or_else(|| MergeError::Xml {
        path: path.display().to_string(),
        message: "no top-level <suite> element".to_string(),
    })
}

/// Byte-slice the first top-level `<suite>...</suite>` out of a document.
fn extract_suite_fragment(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    loop {
        let before = reader.buffer_position();
        match reader.read_event().ok()? {
            Event::Start(e) if e.name().as_ref() == b"suite" => {
                if depth == 0 {
                    start = Some(before);
                }
                depth += 1;
            }
            Event::End(e) if e.name().as_ref() == b"suite" => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let end = reader.buffer_position();
                    return Some(xml[start?..end].to_string());
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"suite" && depth == 0 => {
                let end = reader.buffer_position();
                return Some(xml[before..end].to_string());
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

/// Rewrite quoted artifact references in `log.html` and `report.html`.
fn rewrite_references(output_dir: &Path, mapping: &ArtifactMapping) -> Result<(), MergeError> {
    if mapping.entries.is_empty() {
        return Ok(());
    }
    for file in ["log.html", "report.html"] {
        let path = output_dir.join(file);
        if !path.exists() {
            continue;
        }
        let original = fs::read_to_string(&path)?;
        let mut rewritten = original.clone();
        for (from, to) in &mapping.entries {
            rewritten = rewritten
                .replace(&format!("\"{from}\""), &format!("\"{to}\""))
                .replace(&format!("'{from}'"), &format!("'{to}'"));
        }
        if rewritten != original {
            info!(path = %path.display(), "rewrote artifact references");
            fs::write(&path, rewritten)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "merger_tests.rs"]
mod tests;
