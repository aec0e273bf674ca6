// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use pabot_plan::PlanError;
use thiserror::Error;

/// Fatal errors that abort the run.
///
/// Per-unit failures (failing tests, timeouts, skipped dependents) are not
/// errors; they are recorded outcomes. Only a broken plan, an unspawnable
/// worker, or cancellation stops the world.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("cannot start worker for {unit}: {message}")]
    Spawn { unit: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("run cancelled: {0}")]
    Cancelled(String),
}
