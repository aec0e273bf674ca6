// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker driver: command assembly, environment injection, output capture,
//! and exit-code interpretation for one dispatched unit.

use crate::config::ExecutionConfig;
use crate::subprocess::{self, WaitOutcome};
use async_trait::async_trait;
use pabot_core::{CallerId, OutcomeKind, Unit, UnitKind};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Cancellation signal shared by all worker tasks of a run.
pub type CancelRx = tokio::sync::watch::Receiver<bool>;

/// Everything needed to execute one dispatch.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub unit: Unit,
    pub queue_index: usize,
    pub pool_id: usize,
    pub caller_id: CallerId,
    /// Fully assembled command line, program first.
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub output_dir: PathBuf,
    pub timeout: Option<Duration>,
}

/// Assemble the command line and environment for a unit.
///
/// Layout: base runner invocation, synthesized flags (output directory and
/// injected variables), per-unit extra args, suite/test selectors, then the
/// user's runner-native arguments and data sources verbatim.
pub fn build_spec(
    config: &ExecutionConfig,
    unit: Unit,
    queue_index: usize,
    pool_id: usize,
) -> WorkerSpec {
    let caller_id = CallerId::generate();
    let output_dir = config.unit_dir(queue_index);

    let mut argv = config.command.clone();
    argv.push("--outputdir".to_string());
    argv.push(output_dir.display().to_string());

    let variables = [
        ("PABOTQUEUEINDEX", queue_index.to_string()),
        ("PABOTEXECUTIONPOOLID", pool_id.to_string()),
        ("PABOTNUMBEROFPROCESSES", config.processes.to_string()),
        ("PABOTLIBURI", config.lib_uri.clone()),
        ("CALLER_ID", caller_id.to_string()),
    ];
    for (name, value) in &variables {
        argv.push("--variable".to_string());
        argv.push(format!("{name}:{value}"));
    }

    argv.extend(unit.args.iter().cloned());
    push_selectors(&unit, &mut argv);
    argv.extend(config.runner_args.iter().cloned());

    let env = variables
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();

    WorkerSpec {
        unit,
        queue_index,
        pool_id,
        caller_id,
        argv,
        env,
        output_dir,
        timeout: config.process_timeout,
    }
}

fn push_selectors(unit: &Unit, argv: &mut Vec<String>) {
    match unit.kind {
        UnitKind::Group => {
            for member in &unit.members {
                push_selectors(member, argv);
            }
        }
        UnitKind::Suite | UnitKind::Test => {
            if let Some(flag) = unit.selector_flag() {
                argv.push(flag.to_string());
                argv.push(unit.name.clone());
            }
        }
    }
}

/// Map a runner exit code to an outcome.
///
/// 0 is a pass; 1..=249 means failing tests (a completed run); anything
/// higher is a runner error, as is death by signal.
pub fn interpret_exit(code: Option<i32>) -> OutcomeKind {
    match code {
        Some(0) => OutcomeKind::Passed,
        Some(c @ 1..=249) => OutcomeKind::Failed { exit_code: c },
        Some(c) => OutcomeKind::RunnerError { exit_code: Some(c) },
        None => OutcomeKind::RunnerError { exit_code: None },
    }
}

/// Seam between the executor and actual subprocesses.
#[async_trait]
pub trait ProcessRunner: Clone + Send + Sync + 'static {
    /// Run the dispatch to completion and report how it ended.
    ///
    /// Must honor `cancel` by terminating the work and returning promptly.
    async fn run(&self, spec: &WorkerSpec, cancel: CancelRx) -> OutcomeKind;
}

/// Production runner: spawns the assembled command as an OS process.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner;

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(&self, spec: &WorkerSpec, mut cancel: CancelRx) -> OutcomeKind {
        match self.run_inner(spec, &mut cancel).await {
            Ok(kind) => kind,
            Err(e) => OutcomeKind::SpawnFailed {
                message: e.to_string(),
            },
        }
    }
}

impl SubprocessRunner {
    async fn run_inner(
        &self,
        spec: &WorkerSpec,
        cancel: &mut CancelRx,
    ) -> std::io::Result<OutcomeKind> {
        std::fs::create_dir_all(&spec.output_dir)?;
        let stdout = std::fs::File::create(spec.output_dir.join("stdout.txt"))?;
        let stderr = std::fs::File::create(spec.output_dir.join("stderr.txt"))?;

        let (program, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        debug!(
            unit = %spec.unit,
            queue_index = spec.queue_index,
            argv = ?spec.argv,
            "spawning worker"
        );
        let mut child = subprocess::spawn(cmd, Stdio::from(stdout), Stdio::from(stderr))?;

        // The wait future borrows the child; drop it before a cancellation
        // terminate needs the same borrow.
        let waited = {
            let wait = subprocess::wait_with_timeout(&mut child, spec.timeout);
            tokio::pin!(wait);
            tokio::select! {
                waited = &mut wait => Some(waited?),
                _ = cancel.changed() => None,
            }
        };

        match waited {
            Some(WaitOutcome::Exited(code)) => Ok(interpret_exit(code)),
            Some(WaitOutcome::TimedOut) => Ok(OutcomeKind::TimedOut),
            None => {
                info!(unit = %spec.unit, "cancelling worker");
                subprocess::terminate(&mut child).await?;
                Ok(OutcomeKind::RunnerError { exit_code: None })
            }
        }
    }
}

/// Scripted runner for executor tests.
///
/// Records every spec it runs and completes with the outcome configured for
/// the unit name (default pass), after an optional delay.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeRunner {
    inner: std::sync::Arc<parking_lot::Mutex<FakeRunnerState>>,
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
struct FakeRunnerState {
    outcomes: std::collections::HashMap<String, OutcomeKind>,
    delays: std::collections::HashMap<String, Duration>,
    started: Vec<String>,
    finished: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for a unit name.
    pub fn set_outcome(&self, name: &str, kind: OutcomeKind) {
        self.inner.lock().outcomes.insert(name.to_string(), kind);
    }

    /// Script a run duration for a unit name.
    pub fn set_delay(&self, name: &str, delay: Duration) {
        self.inner.lock().delays.insert(name.to_string(), delay);
    }

    /// Unit names in observed start order.
    pub fn started(&self) -> Vec<String> {
        self.inner.lock().started.clone()
    }

    /// Unit names in observed completion order.
    pub fn finished(&self) -> Vec<String> {
        self.inner.lock().finished.clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, spec: &WorkerSpec, mut cancel: CancelRx) -> OutcomeKind {
        let name = spec.unit.name.clone();
        let (delay, outcome) = {
            let state = self.inner.lock();
            (
                state.delays.get(&name).copied().unwrap_or(Duration::ZERO),
                state
                    .outcomes
                    .get(&name)
                    .cloned()
                    .unwrap_or(OutcomeKind::Passed),
            )
        };
        self.inner.lock().started.push(name.clone());

        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.changed() => {
                    self.inner.lock().finished.push(name);
                    return OutcomeKind::RunnerError { exit_code: None };
                }
            }
        }

        self.inner.lock().finished.push(name);
        outcome
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
