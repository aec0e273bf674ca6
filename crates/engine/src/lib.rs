// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pabot-engine: scheduling, worker execution, discovery, and merging.
//!
//! The scheduler is a sans-IO state machine; the executor wires it to
//! worker subprocesses on tokio. Discovery produces the unit list by
//! invoking the runner in dry-run mode (or loading the cache), and the
//! merger consolidates per-unit outputs after the run.

pub mod artifacts;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod merger;
pub mod scheduler;
pub mod subprocess;
pub mod worker;

pub use config::ExecutionConfig;
pub use discovery::{discover, DiscoveryError, DiscoveryOptions};
pub use error::RuntimeError;
pub use executor::{Executor, RunOutput};
pub use merger::{merge, MergeError, MergeInput};
pub use scheduler::{Action, Dispatch, Scheduler};
pub use worker::{ProcessRunner, SubprocessRunner, WorkerSpec};

#[cfg(any(test, feature = "test-support"))]
pub use worker::FakeRunner;
