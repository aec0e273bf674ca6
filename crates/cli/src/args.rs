// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument parsing.
//!
//! Pabot-specific flags precede runner-native arguments; everything from the
//! first unrecognized token on is passed to the runner verbatim. Two
//! constructs fall outside clap's model and are pre-extracted from argv:
//! the `--command ... --end-command` capture and numbered
//! `--argumentfileN PATH` flags.

use clap::Parser;
use pabot_engine::config::{default_processes, ExecutionConfig};
use pabot_engine::discovery::DiscoveryOptions;
use std::path::PathBuf;
use thiserror::Error;

/// Cache file written next to the invocation.
pub const CACHE_FILE: &str = ".pabotsuitenames";

/// Errors from argument parsing
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error(transparent)]
    Clap(#[from] clap::Error),

    #[error("--command is missing a closing --end-command")]
    UnterminatedCommand,

    #[error("--command requires at least one argument")]
    EmptyCommand,

    #[error("--argumentfile{index} requires a path")]
    ArgumentFileMissingPath { index: usize },

    #[error("invalid --processes value: {0} (expected a number or 'all')")]
    InvalidProcesses(String),

    #[error("invalid --shard value: {0} (expected I/N)")]
    InvalidShard(String),
}

/// Worker budget: a fixed count or one worker per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessCount {
    Fixed(usize),
    All,
}

impl ProcessCount {
    /// Resolve against the number of units in the plan.
    pub fn resolve(self, unit_count: usize) -> usize {
        match self {
            ProcessCount::Fixed(n) => n.max(1),
            ProcessCount::All => unit_count.max(1),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pabot",
    version,
    about = "Parallel executor for test suites",
    long_about = "Runs a test corpus in parallel worker subprocesses, coordinates \
                  cross-process locks and resources, and merges per-worker outputs \
                  into one report.\n\nPabot flags come first; everything after the \
                  first runner-native argument is passed to the runner verbatim."
)]
struct Cli {
    /// Verbose progress output
    #[arg(long)]
    verbose: bool,

    /// Split execution at test level instead of suite level
    #[arg(long)]
    testlevelsplit: bool,

    /// Number of worker processes, or 'all' for one per unit
    #[arg(long, value_name = "N|all")]
    processes: Option<String>,

    /// Start the coordination server (default)
    #[arg(long, overrides_with = "no_pabotlib")]
    pabotlib: bool,

    /// Do not start the coordination server
    #[arg(long = "no-pabotlib", overrides_with = "pabotlib")]
    no_pabotlib: bool,

    /// Coordination server host
    #[arg(long, value_name = "HOST")]
    pabotlibhost: Option<String>,

    /// Coordination server port
    #[arg(long, value_name = "PORT")]
    pabotlibport: Option<u16>,

    /// Per-worker timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    processtimeout: Option<u64>,

    /// Run only the I-th of N contiguous shards
    #[arg(long, value_name = "I/N")]
    shard: Option<String>,

    /// Artifact extensions to collect, comma-separated
    #[arg(long, value_name = "EXT,EXT")]
    artifacts: Option<String>,

    /// Recurse into subfolders when collecting artifacts
    #[arg(long)]
    artifactsinsubfolders: bool,

    /// Value-set resource file for the coordination server
    #[arg(long, value_name = "PATH")]
    resourcefile: Option<PathBuf>,

    /// Order suites from a previous run's output: failed first, then slowest
    #[arg(long, value_name = "PATH")]
    suitesfrom: Option<PathBuf>,

    /// Explicit ordering file replacing the discovered plan
    #[arg(long, value_name = "PATH")]
    ordering: Option<PathBuf>,

    /// Bundle units into one chunk per worker
    #[arg(long)]
    chunk: bool,

    /// Modifier forwarded to the runner's dry-run enumeration
    #[arg(long, value_name = "MODIFIER")]
    pabotprerunmodifier: Option<String>,

    /// Skip merging per-unit outputs into one report
    #[arg(long = "no-rebot")]
    no_rebot: bool,

    /// Runner-native arguments and data sources, passed through verbatim
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "RUNNER_ARGS")]
    runner_args: Vec<String>,
}

/// Fully parsed invocation.
#[derive(Debug)]
pub struct ParsedArgs {
    pub config: ExecutionConfig,
    pub discovery: DiscoveryOptions,
    pub processes: ProcessCount,
    pub pabotlib: bool,
    pub pabotlibhost: String,
    pub pabotlibport: u16,
    pub resourcefile: Option<PathBuf>,
}

/// Parse a full argv (program name excluded).
pub fn parse(argv: Vec<String>) -> Result<ParsedArgs, ArgsError> {
    let (command, rest) = extract_command(argv)?;
    let (argument_files, rest) = extract_argument_files(rest)?;

    let cli = Cli::try_parse_from(std::iter::once("pabot".to_string()).chain(rest))?;

    let processes = match cli.processes.as_deref() {
        None => ProcessCount::Fixed(default_processes()),
        Some("all") => ProcessCount::All,
        Some(value) => value
            .parse::<usize>()
            .map(ProcessCount::Fixed)
            .map_err(|_| ArgsError::InvalidProcesses(value.to_string()))?,
    };

    let shard = cli.shard.as_deref().map(parse_shard).transpose()?;

    let mut config = ExecutionConfig {
        runner_args: cli.runner_args,
        process_timeout: cli.processtimeout.map(std::time::Duration::from_secs),
        artifacts_in_subfolders: cli.artifactsinsubfolders,
        argument_files,
        no_rebot: cli.no_rebot,
        verbose: cli.verbose,
        ..ExecutionConfig::default()
    };
    if let Some(command) = command {
        config.command = command;
    }
    if let Some(list) = cli.artifacts.as_deref() {
        config.artifacts = list
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
    }

    let discovery = DiscoveryOptions {
        cache_path: PathBuf::from(CACHE_FILE),
        ordering_file: cli.ordering,
        suites_from: cli.suitesfrom,
        test_level_split: cli.testlevelsplit,
        shard,
        chunk: cli.chunk,
        prerun_modifier: cli.pabotprerunmodifier,
    };

    Ok(ParsedArgs {
        config,
        discovery,
        processes,
        // overrides_with keeps whichever of --pabotlib/--no-pabotlib came last
        pabotlib: cli.pabotlib || !cli.no_pabotlib,
        pabotlibhost: cli
            .pabotlibhost
            .unwrap_or_else(|| pabot_server::DEFAULT_HOST.to_string()),
        pabotlibport: cli.pabotlibport.unwrap_or(pabot_server::DEFAULT_PORT),
        resourcefile: cli.resourcefile,
    })
}

/// Pull `--command ... --end-command` out of argv.
fn extract_command(argv: Vec<String>) -> Result<(Option<Vec<String>>, Vec<String>), ArgsError> {
    let Some(start) = argv.iter().position(|a| a == "--command") else {
        return Ok((None, argv));
    };
    let Some(len) = argv[start + 1..].iter().position(|a| a == "--end-command") else {
        return Err(ArgsError::UnterminatedCommand);
    };
    if len == 0 {
        return Err(ArgsError::EmptyCommand);
    }

    let mut rest = argv;
    let command: Vec<String> = rest.drain(start..=start + 1 + len).collect();
    // Strip the delimiters
    let command = command[1..=len].to_vec();
    Ok((Some(command), rest))
}

/// Pull numbered `--argumentfileN PATH` flags out of argv, in index order.
///
/// The plain runner flag `--argumentfile` (no digit) is not ours and passes
/// through untouched.
fn extract_argument_files(argv: Vec<String>) -> Result<(Vec<PathBuf>, Vec<String>), ArgsError> {
    let mut files: Vec<(usize, PathBuf)> = Vec::new();
    let mut rest: Vec<String> = Vec::with_capacity(argv.len());
    let mut iter = argv.into_iter();

    while let Some(arg) = iter.next() {
        let index = arg
            .strip_prefix("--argumentfile")
            .filter(|suffix| !suffix.is_empty())
            .and_then(|suffix| suffix.parse::<usize>().ok());
        match index {
            Some(index) => {
                let path = iter
                    .next()
                    .ok_or(ArgsError::ArgumentFileMissingPath { index })?;
                files.push((index, PathBuf::from(path)));
            }
            None => rest.push(arg),
        }
    }

    files.sort_by_key(|(index, _)| *index);
    Ok((files.into_iter().map(|(_, path)| path).collect(), rest))
}

fn parse_shard(value: &str) -> Result<(usize, usize), ArgsError> {
    let invalid = || ArgsError::InvalidShard(value.to_string());
    let (index, total) = value.split_once('/').ok_or_else(invalid)?;
    let index: usize = index.trim().parse().map_err(|_| invalid())?;
    let total: usize = total.trim().parse().map_err(|_| invalid())?;
    if index == 0 || total == 0 || index > total {
        return Err(invalid());
    }
    Ok((index, total))
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
