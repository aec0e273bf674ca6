// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run loop: wires the scheduler to worker tasks.
//!
//! Single-threaded and event-driven: dispatch while slots are free, then
//! block until a worker completion arrives or shutdown is requested. Worker
//! startup delays happen inside the worker's own task, so parallel sleeps
//! never serialize the loop.

use crate::artifacts::{self, ArtifactMapping};
use crate::config::ExecutionConfig;
use crate::error::RuntimeError;
use crate::merger::MergeInput;
use crate::scheduler::{Action, Dispatch, Scheduler};
use crate::subprocess::DRAIN_TIMEOUT;
use crate::worker::{build_spec, ProcessRunner};
use pabot_core::{OutcomeKind, PlanItem, RunStats, UnitId, UnitOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{error, info, warn};

/// Completion event sent by a worker task.
#[derive(Debug)]
struct WorkerEvent {
    unit_id: UnitId,
    name: String,
    argfile: Option<usize>,
    queue_index: usize,
    kind: OutcomeKind,
    elapsed_ms: u64,
}

/// Everything the run produced.
#[derive(Debug)]
pub struct RunOutput {
    pub stats: RunStats,
    pub merge_inputs: Vec<MergeInput>,
    pub artifact_mapping: ArtifactMapping,
    /// Set when the run was aborted (spawn failure or cancellation); the
    /// outcomes gathered so far are still valid and mergeable.
    pub fatal: Option<RuntimeError>,
}

/// Executes a resolved plan against a [`ProcessRunner`].
pub struct Executor<R: ProcessRunner> {
    config: Arc<ExecutionConfig>,
    runner: R,
    scheduler: Scheduler,
}

impl<R: ProcessRunner> Executor<R> {
    pub fn new(config: Arc<ExecutionConfig>, runner: R, items: Vec<PlanItem>) -> Self {
        let scheduler = Scheduler::new(config.processes, items);
        Self {
            config,
            runner,
            scheduler,
        }
    }

    /// Run the plan to completion.
    ///
    /// `shutdown` cancels the run: dispatch stops, running workers are
    /// terminated, and whatever completed is returned for merging.
    pub async fn run(mut self, shutdown: Arc<Notify>) -> RunOutput {
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerEvent>();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let mut stats = RunStats::new();
        let mut merge_inputs = Vec::new();
        let mut artifact_mapping = ArtifactMapping::default();
        let mut fatal: Option<RuntimeError> = None;
        let mut draining = false;

        loop {
            if !draining {
                for action in self.scheduler.next_actions() {
                    match action {
                        Action::Skip(outcome) => stats.record(outcome),
                        Action::Spawn(dispatch) => self.spawn_worker(dispatch, &tx, &cancel_rx),
                    }
                }
            }

            if self.scheduler.is_done() {
                break;
            }

            tokio::select! {
                _ = shutdown.notified(), if !draining => {
                    warn!("shutdown requested, draining workers");
                    fatal = Some(RuntimeError::Cancelled("shutdown requested".to_string()));
                    draining = true;
                    self.scheduler.clear_pending();
                    let _ = cancel_tx.send(true);
                }
                event = recv_event(&mut rx, draining) => {
                    let Some(event) = event else {
                        warn!("drain timeout elapsed, abandoning remaining workers");
                        break;
                    };

                    if matches!(event.kind, OutcomeKind::SpawnFailed { .. }) && !draining {
                        error!(unit = %event.name, outcome = %event.kind, "aborting run");
                        fatal = Some(RuntimeError::Spawn {
                            unit: event.name.clone(),
                            message: event.kind.to_string(),
                        });
                        draining = true;
                        self.scheduler.clear_pending();
                        let _ = cancel_tx.send(true);
                    }

                    self.record_completion(
                        event,
                        &mut stats,
                        &mut merge_inputs,
                        &mut artifact_mapping,
                    );
                }
            }
        }

        info!(
            total = stats.total(),
            passed = stats.passed(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            "run complete"
        );

        RunOutput {
            stats,
            merge_inputs,
            artifact_mapping,
            fatal,
        }
    }

    fn spawn_worker(
        &self,
        dispatch: Dispatch,
        tx: &mpsc::UnboundedSender<WorkerEvent>,
        cancel_rx: &watch::Receiver<bool>,
    ) {
        let Dispatch {
            unit,
            queue_index,
            pool_id,
            sleep,
        } = dispatch;
        let unit_id = unit.id;
        let name = unit.name.clone();
        let argfile = unit.argfile;
        let spec = build_spec(&self.config, unit, queue_index, pool_id);

        let runner = self.runner.clone();
        let tx = tx.clone();
        let mut cancel = cancel_rx.clone();

        tokio::spawn(async move {
            if sleep > 0 {
                info!(unit = %name, seconds = sleep, "waiting before spawn");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(sleep)) => {}
                    _ = cancel.changed() => {
                        let _ = tx.send(WorkerEvent {
                            unit_id,
                            name,
                            argfile,
                            queue_index,
                            kind: OutcomeKind::RunnerError { exit_code: None },
                            elapsed_ms: 0,
                        });
                        return;
                    }
                }
            }

            let start = Instant::now();
            let kind = runner.run(&spec, cancel).await;
            let _ = tx.send(WorkerEvent {
                unit_id,
                name,
                argfile,
                queue_index,
                kind,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        });
    }

    fn record_completion(
        &mut self,
        event: WorkerEvent,
        stats: &mut RunStats,
        merge_inputs: &mut Vec<MergeInput>,
        artifact_mapping: &mut ArtifactMapping,
    ) {
        info!(
            unit = %event.name,
            queue_index = event.queue_index,
            outcome = %event.kind,
            elapsed_ms = event.elapsed_ms,
            "worker finished"
        );

        if event.kind.ran() {
            merge_inputs.push(MergeInput {
                name: event.name.clone(),
                queue_index: event.queue_index,
                argfile: event.argfile,
            });
            match artifacts::collect(
                &self.config.unit_dir(event.queue_index),
                &self.config.output_dir,
                event.queue_index,
                &self.config.artifacts,
                self.config.artifacts_in_subfolders,
            ) {
                Ok(mapping) => artifact_mapping.extend(mapping),
                Err(e) => warn!(
                    queue_index = event.queue_index,
                    error = %e,
                    "artifact collection failed"
                ),
            }
        }

        stats.record(UnitOutcome {
            unit_id: event.unit_id,
            name: event.name,
            kind: event.kind.clone(),
            queue_index: Some(event.queue_index),
            elapsed_ms: event.elapsed_ms,
        });

        for action in self.scheduler.on_completed(event.unit_id, event.kind) {
            match action {
                Action::Skip(outcome) => stats.record(outcome),
                Action::Spawn(_) => {
                    // on_completed only surfaces skips; dispatches come from
                    // the next_actions pass at the top of the loop.
                }
            }
        }
    }
}

/// Receive the next completion, bounded by the drain timeout while draining.
async fn recv_event(
    rx: &mut mpsc::UnboundedReceiver<WorkerEvent>,
    draining: bool,
) -> Option<WorkerEvent> {
    if draining {
        tokio::time::timeout(DRAIN_TIMEOUT, rx.recv())
            .await
            .ok()
            .flatten()
    } else {
        rx.recv().await
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
