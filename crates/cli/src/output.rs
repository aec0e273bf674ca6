// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-of-run summary rendering.

use pabot_core::{format_elapsed_ms, OutcomeKind, RunStats};
use std::time::Duration;

/// Render the end-of-run summary block.
pub fn render_summary(stats: &RunStats, elapsed: Duration, verbose: bool) -> String {
    let mut out = String::new();

    if verbose {
        for outcome in stats.outcomes() {
            let marker = match &outcome.kind {
                OutcomeKind::Passed => "PASS",
                OutcomeKind::Skipped { .. } => "SKIP",
                _ => "FAIL",
            };
            out.push_str(&format!(
                "{marker}  {} ({}, {})\n",
                outcome.name,
                outcome.kind,
                format_elapsed_ms(outcome.elapsed_ms),
            ));
        }
    } else {
        for outcome in stats.outcomes().filter(|o| !o.kind.is_passing()) {
            out.push_str(&format!("{}: {}\n", outcome.name, outcome.kind));
        }
    }

    out.push_str(&format!(
        "{} units: {} passed, {} failed, {} skipped in {}\n",
        stats.total(),
        stats.passed(),
        stats.failed(),
        stats.skipped(),
        format_elapsed_ms(elapsed.as_millis() as u64),
    ));
    out
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
