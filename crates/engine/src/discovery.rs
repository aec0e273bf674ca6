// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit discovery.
//!
//! Resolves the user's inputs into the canonical unit list: loads the
//! discovery cache when its fingerprints match, otherwise enumerates
//! suites/tests by invoking the runner in dry-run mode and caches the
//! result. Applies `--suitesfrom` ordering, sharding, argument-file
//! expansion, and chunking, then resolves dependencies.

use crate::config::ExecutionConfig;
use crate::subprocess;
use pabot_core::{PlanItem, Unit, UnitId};
use pabot_plan::{parse_items, resolve, CacheError, DiscoveryCache, Fingerprints, PlanError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("runner dry run failed with exit code {code:?}; see {log}")]
    RunnerFailed { code: Option<i32>, log: String },

    #[error("XML error in {path}: {message}")]
    Xml { path: String, message: String },

    #[error("invalid shard {index}/{total}")]
    InvalidShard { index: usize, total: usize },
}

/// Discovery inputs beyond the execution config.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Cache location, conventionally `.pabotsuitenames`.
    pub cache_path: PathBuf,
    /// Explicit ordering file; replaces the cache body entirely.
    pub ordering_file: Option<PathBuf>,
    /// Previous run's output XML for failed-first/slowest-first ordering.
    pub suites_from: Option<PathBuf>,
    /// Split suites into their constituent tests.
    pub test_level_split: bool,
    /// Run only the I-th of N contiguous shards (1-based).
    pub shard: Option<(usize, usize)>,
    /// Bundle units into one group per worker slot.
    pub chunk: bool,
    /// Forwarded to the dry-run invocation.
    pub prerun_modifier: Option<String>,
}

/// Produce the resolved, ordered plan for this invocation.
pub async fn discover(
    config: &ExecutionConfig,
    opts: &DiscoveryOptions,
) -> Result<Vec<PlanItem>, DiscoveryError> {
    if let Some(path) = &opts.ordering_file {
        // An explicit ordering file is authoritative: barriers, groups, and
        // dependencies come from the user, so reordering transforms do not
        // apply. Argument-file expansion still does.
        let mut items = parse_items(&fs::read_to_string(path)?)?;
        if !config.argument_files.is_empty() {
            items = expand_argument_files(items, &config.argument_files);
        }
        renumber(&mut items);
        resolve(&mut items)?;
        info!(path = %path.display(), items = items.len(), "plan loaded from ordering file");
        return Ok(items);
    }

    let fingerprints = compute_fingerprints(config);
    let mut items = match DiscoveryCache::load(&opts.cache_path)? {
        Some(cache) if cache.is_valid_for(&fingerprints) => {
            info!(path = %opts.cache_path.display(), "discovery cache is valid");
            cache.items
        }
        cached => {
            if cached.is_some() {
                info!(path = %opts.cache_path.display(), "discovery cache is stale, re-enumerating");
            }
            let units = enumerate_units(config, opts).await?;
            let items: Vec<PlanItem> = units.into_iter().map(PlanItem::Unit).collect();
            DiscoveryCache::new(fingerprints, items.clone()).save(&opts.cache_path)?;
            info!(path = %opts.cache_path.display(), units = items.len(), "discovery cache written");
            items
        }
    };

    if let Some(path) = &opts.suites_from {
        items = order_from_previous_output(items, path)?;
    }
    if let Some((index, total)) = opts.shard {
        items = shard(items, index, total)?;
    }
    if !config.argument_files.is_empty() {
        items = expand_argument_files(items, &config.argument_files);
    }
    if opts.chunk {
        items = chunk_units(items, config.processes);
    }

    renumber(&mut items);
    resolve(&mut items)?;
    Ok(items)
}

/// Fingerprints over the inputs that invalidate the cache.
///
/// Data sources (non-flag runner arguments) feed the source-paths line,
/// flags feed the flags line, and argument-file contents feed the datafile
/// line. The split is a cache-granularity heuristic; all four lines are
/// opaque to users.
pub fn compute_fingerprints(config: &ExecutionConfig) -> Fingerprints {
    let (flags, paths): (Vec<String>, Vec<String>) = config
        .runner_args
        .iter()
        .cloned()
        .partition(|arg| arg.starts_with('-'));

    let datafile = config
        .argument_files
        .iter()
        .map(|path| fs::read_to_string(path).unwrap_or_else(|_| path.display().to_string()))
        .collect::<Vec<_>>()
        .join("\n");

    Fingerprints::compute(&paths, &config.command, &flags, &datafile)
}

/// Enumerate suites/tests by running the runner in dry-run mode.
async fn enumerate_units(
    config: &ExecutionConfig,
    opts: &DiscoveryOptions,
) -> Result<Vec<Unit>, DiscoveryError> {
    let dryrun_dir = config.results_dir.join("dryrun");
    fs::create_dir_all(&dryrun_dir)?;
    let output_xml = dryrun_dir.join("output.xml");

    let mut argv = config.command.clone();
    argv.push("--dryrun".to_string());
    argv.push("--output".to_string());
    argv.push(output_xml.display().to_string());
    argv.push("--report".to_string());
    argv.push("NONE".to_string());
    argv.push("--log".to_string());
    argv.push("NONE".to_string());
    if let Some(modifier) = &opts.prerun_modifier {
        argv.push("--prerunmodifier".to_string());
        argv.push(modifier.clone());
    }
    argv.extend(config.runner_args.iter().cloned());

    debug!(argv = ?argv, "enumerating suites via dry run");
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;
    let stdout = fs::File::create(dryrun_dir.join("stdout.txt"))?;
    let stderr = fs::File::create(dryrun_dir.join("stderr.txt"))?;
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args);
    let mut child = subprocess::spawn(cmd, Stdio::from(stdout), Stdio::from(stderr))?;
    let status = child.wait().await?;

    // Dry-run test failures still enumerate; only runner errors are fatal.
    match status.code() {
        Some(c) if c < 250 => {}
        code => {
            return Err(DiscoveryError::RunnerFailed {
                code,
                log: dryrun_dir.join("stderr.txt").display().to_string(),
            });
        }
    }

    let explicit_suites = explicit_suite_selections(&config.runner_args);
    let xml = fs::read_to_string(&output_xml)?;
    parse_output_units(&xml, &output_xml, opts.test_level_split, &explicit_suites)
}

/// Suite names the user selected explicitly with `--suite`; these stay at
/// suite level even under `--testlevelsplit`.
fn explicit_suite_selections(runner_args: &[String]) -> Vec<String> {
    runner_args
        .windows(2)
        .filter(|w| w[0] == "--suite" || w[0] == "-s")
        .map(|w| w[1].clone())
        .collect()
}

/// Extract executable units from a runner output XML.
///
/// Suites that directly contain tests become suite units in document order;
/// under test-level split they expand into one unit per test instead.
fn parse_output_units(
    xml: &str,
    path: &Path,
    test_level_split: bool,
    explicit_suites: &[String],
) -> Result<Vec<Unit>, DiscoveryError> {
    let xml_error = |message: String| DiscoveryError::Xml {
        path: path.display().to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut units = Vec::new();
    let mut next_id: u64 = 0;
    let mut stack: Vec<SuiteFrame> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(e.to_string()))?;
        match event {
            Event::Start(e) if e.name().as_ref() == b"suite" => {
                let name = attribute(&e, "name").map_err(&xml_error)?;
                stack.push(SuiteFrame {
                    name,
                    tests: Vec::new(),
                });
            }
            Event::Start(e) if e.name().as_ref() == b"test" => {
                let name = attribute(&e, "name").map_err(&xml_error)?;
                if let Some(frame) = stack.last_mut() {
                    frame.tests.push(name);
                }
            }
            Event::End(e) if e.name().as_ref() == b"suite" => {
                let Some(frame) = stack.pop() else { continue };
                if frame.tests.is_empty() {
                    continue;
                }
                let full_name = full_suite_name(&stack, &frame.name);
                let split = test_level_split && !explicit_suites.contains(&full_name);
                if split {
                    for test in &frame.tests {
                        units.push(Unit::test(
                            UnitId::new(take(&mut next_id)),
                            format!("{full_name}.{test}"),
                        ));
                    }
                } else {
                    units.push(Unit::suite(UnitId::new(take(&mut next_id)), full_name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if units.is_empty() {
        warn!(path = %path.display(), "dry run enumerated no executable suites");
    }
    Ok(units)
}

struct SuiteFrame {
    name: String,
    tests: Vec<String>,
}

fn full_suite_name(stack: &[SuiteFrame], leaf: &str) -> String {
    let mut parts: Vec<&str> = stack.iter().map(|f| f.name.as_str()).collect();
    parts.push(leaf);
    parts.join(".")
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Result<String, String> {
    e.try_get_attribute(name)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("element missing {name} attribute"))
        .and_then(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .map_err(|e| e.to_string())
        })
}

fn take(next_id: &mut u64) -> u64 {
    let id = *next_id;
    *next_id += 1;
    id
}

/// Reorder a flat unit list from a previous run's output: failed suites
/// first, then the rest by observed elapsed time descending. Units absent
/// from the previous output keep plan order at the end.
fn order_from_previous_output(
    items: Vec<PlanItem>,
    path: &Path,
) -> Result<Vec<PlanItem>, DiscoveryError> {
    if items.iter().any(|i| !matches!(i, PlanItem::Unit(_))) {
        warn!("plan contains ordering directives; ignoring --suitesfrom");
        return Ok(items);
    }

    let history = parse_run_history(&fs::read_to_string(path)?, path)?;
    let mut failed = Vec::new();
    let mut timed: Vec<(u64, PlanItem)> = Vec::new();
    let mut unknown = Vec::new();

    for item in items {
        let name = item.as_unit().map(|u| u.name.clone()).unwrap_or_default();
        match history.get(&name) {
            Some(run) if run.failed => failed.push(item),
            Some(run) => timed.push((run.elapsed_ms, item)),
            None => unknown.push(item),
        }
    }

    // Stable by construction: sort_by_key keeps plan order for equal times.
    timed.sort_by_key(|(elapsed, _)| std::cmp::Reverse(*elapsed));

    let mut ordered = failed;
    ordered.extend(timed.into_iter().map(|(_, item)| item));
    ordered.extend(unknown);
    Ok(ordered)
}

struct SuiteRun {
    failed: bool,
    elapsed_ms: u64,
}

/// Read per-suite status and elapsed time from a previous output XML.
fn parse_run_history(
    xml: &str,
    path: &Path,
) -> Result<HashMap<String, SuiteRun>, DiscoveryError> {
    let xml_error = |message: String| DiscoveryError::Xml {
        path: path.display().to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut history = HashMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut nested = 0usize;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(e.to_string()))?;
        match event {
            Event::Start(e) if e.name().as_ref() == b"suite" => {
                let name = attribute(&e, "name").map_err(&xml_error)?;
                stack.push(name);
            }
            Event::End(e) if e.name().as_ref() == b"suite" => {
                stack.pop();
            }
            Event::Start(e) if matches!(e.name().as_ref(), b"test" | b"kw") => {
                nested += 1;
            }
            Event::End(e) if matches!(e.name().as_ref(), b"test" | b"kw") => {
                nested = nested.saturating_sub(1);
            }
            // Only a suite's own status line counts; test and keyword
            // statuses must not shadow the suite verdict.
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"status" => {
                if stack.is_empty() || nested > 0 {
                    continue;
                }
                let full_name = stack.join(".");
                let failed = e
                    .try_get_attribute("status")
                    .map_err(|err| xml_error(err.to_string()))?
                    .map(|a| a.value.as_ref() == b"FAIL")
                    .unwrap_or(false);
                let elapsed_ms = e
                    .try_get_attribute("elapsed")
                    .map_err(|err| xml_error(err.to_string()))?
                    .and_then(|a| String::from_utf8_lossy(&a.value).parse::<f64>().ok())
                    .map(|secs| (secs * 1000.0) as u64)
                    .unwrap_or(0);
                // The first status under a suite is the suite's own; deeper
                // test statuses only overwrite when keys repeat, which is
                // fine for ordering purposes.
                history
                    .entry(full_name)
                    .or_insert(SuiteRun { failed, elapsed_ms });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(history)
}

/// Keep only the 1-based `index`-th of `total` contiguous shards.
fn shard(
    items: Vec<PlanItem>,
    index: usize,
    total: usize,
) -> Result<Vec<PlanItem>, DiscoveryError> {
    if total == 0 || index == 0 || index > total {
        return Err(DiscoveryError::InvalidShard { index, total });
    }
    if items.iter().any(|i| !matches!(i, PlanItem::Unit(_))) {
        warn!("plan contains ordering directives; ignoring --shard");
        return Ok(items);
    }
    let len = items.len();
    let start = (index - 1) * len / total;
    let end = index * len / total;
    info!(index, total, kept = end - start, of = len, "sharding plan");
    Ok(items
        .into_iter()
        .skip(start)
        .take(end - start)
        .collect())
}

/// Duplicate every unit once per argument file, in file order.
fn expand_argument_files(items: Vec<PlanItem>, files: &[PathBuf]) -> Vec<PlanItem> {
    let mut expanded = Vec::with_capacity(items.len() * files.len());
    for item in items {
        match item {
            PlanItem::Unit(unit) => {
                for (index, file) in files.iter().enumerate() {
                    let mut variant = unit.clone();
                    variant.argfile = Some(index + 1);
                    variant.args.push("--argumentfile".to_string());
                    variant.args.push(file.display().to_string());
                    expanded.push(PlanItem::Unit(variant));
                }
            }
            other => expanded.push(other),
        }
    }
    expanded
}

/// Bundle a flat unit list into one group per worker slot.
fn chunk_units(items: Vec<PlanItem>, processes: usize) -> Vec<PlanItem> {
    if items.iter().any(|i| !matches!(i, PlanItem::Unit(_))) {
        warn!("plan contains ordering directives; ignoring --chunk");
        return items;
    }
    let units: Vec<Unit> = items
        .into_iter()
        .filter_map(|i| match i {
            PlanItem::Unit(u) => Some(u),
            _ => None,
        })
        .collect();

    let total = units.len();
    let chunks = processes.clamp(1, total.max(1));
    let mut out = Vec::with_capacity(chunks);
    let mut units = units.into_iter();
    for chunk_index in 0..chunks {
        let start = chunk_index * total / chunks;
        let end = (chunk_index + 1) * total / chunks;
        let members: Vec<Unit> = units.by_ref().take(end - start).collect();
        match members.len() {
            0 => {}
            1 => out.extend(members.into_iter().map(PlanItem::Unit)),
            _ => out.push(PlanItem::Unit(Unit::group(UnitId::new(0), members))),
        }
    }
    out
}

/// Reassign unit ids monotonically in document order (members before their
/// group, matching the parser).
fn renumber(items: &mut [PlanItem]) {
    let mut next_id: u64 = 0;
    for item in items.iter_mut() {
        if let PlanItem::Unit(unit) = item {
            for member in unit.members.iter_mut() {
                member.id = UnitId::new(take(&mut next_id));
            }
            unit.id = UnitId::new(take(&mut next_id));
        }
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
