// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Grace period between soft-stop and hard kill.
pub const KILL_GRACE: Duration = Duration::from_secs(3);

/// How long draining waits for workers after cancellation.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How a waited-on child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Child exited on its own; `None` exit code means killed by signal.
    Exited(Option<i32>),
    /// The deadline elapsed; the child was soft-stopped then killed.
    TimedOut,
}

/// Spawn a command with the given stdio handles.
pub fn spawn(mut cmd: Command, stdout: Stdio, stderr: Stdio) -> std::io::Result<Child> {
    cmd.stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);
    cmd.spawn()
}

/// Wait for a child with an optional deadline.
///
/// On timeout the child is soft-stopped (SIGTERM), given [`KILL_GRACE`] to
/// exit, then hard-killed.
pub async fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<WaitOutcome> {
    match timeout {
        None => {
            let status = child.wait().await?;
            Ok(WaitOutcome::Exited(status.code()))
        }
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Ok(WaitOutcome::Exited(status?.code())),
            Err(_elapsed) => {
                terminate(child).await?;
                Ok(WaitOutcome::TimedOut)
            }
        },
    }
}

/// Soft-stop, wait out the grace period, then hard-kill.
pub async fn terminate(child: &mut Child) -> std::io::Result<()> {
    soft_stop(child).await;
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        child.kill().await?;
    }
    Ok(())
}

/// Ask the child to exit (SIGTERM). Best effort; the grace/kill path
/// handles children that ignore it.
async fn soft_stop(child: &Child) {
    let Some(pid) = child.id() else { return };
    let result = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        tracing::debug!(pid, error = %e, "soft-stop failed");
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
