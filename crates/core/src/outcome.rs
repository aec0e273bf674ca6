// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-unit completion outcomes.

use crate::id::{QueueIndex, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a unit's execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Runner exited 0.
    Passed,
    /// Runner reported failing tests (exit 1..=249). Still a completed run.
    Failed { exit_code: i32 },
    /// Runner error (exit >= 250) or killed by signal.
    RunnerError { exit_code: Option<i32> },
    /// Worker exceeded the per-process timeout and was killed.
    TimedOut,
    /// Never started: a dependency did not pass.
    Skipped { blocked_on: String },
    /// Could not spawn the worker process.
    SpawnFailed { message: String },
}

impl OutcomeKind {
    /// True only for a clean pass; dependents may start.
    pub fn is_passing(&self) -> bool {
        matches!(self, OutcomeKind::Passed)
    }

    /// True when a subprocess actually ran to completion (pass or fail).
    pub fn ran(&self) -> bool {
        matches!(
            self,
            OutcomeKind::Passed | OutcomeKind::Failed { .. } | OutcomeKind::RunnerError { .. }
        )
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Passed => write!(f, "passed"),
            OutcomeKind::Failed { exit_code } => write!(f, "failed (exit {})", exit_code),
            OutcomeKind::RunnerError { exit_code: Some(c) } => write!(f, "runner error (exit {})", c),
            OutcomeKind::RunnerError { exit_code: None } => write!(f, "runner error (signal)"),
            OutcomeKind::TimedOut => write!(f, "timed out"),
            OutcomeKind::Skipped { blocked_on } => {
                write!(f, "skipped (dependency {} did not pass)", blocked_on)
            }
            OutcomeKind::SpawnFailed { message } => write!(f, "spawn failed: {}", message),
        }
    }
}

/// Completion record for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub unit_id: UnitId,
    pub name: String,
    pub kind: OutcomeKind,
    /// Queue index the dispatch ran under; `None` for skipped units.
    pub queue_index: Option<QueueIndex>,
    /// Wall-clock run time in milliseconds; 0 for skipped units.
    pub elapsed_ms: u64,
}

impl UnitOutcome {
    /// A skipped outcome for a unit whose dependency did not pass.
    pub fn skipped(unit_id: UnitId, name: impl Into<String>, blocked_on: impl Into<String>) -> Self {
        Self {
            unit_id,
            name: name.into(),
            kind: OutcomeKind::Skipped {
                blocked_on: blocked_on.into(),
            },
            queue_index: None,
            elapsed_ms: 0,
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
