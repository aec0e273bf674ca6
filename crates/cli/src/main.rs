// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pabot - parallel executor for test suites
//!
//! Wires the pieces end to end: argument parsing, the embedded coordination
//! server, discovery, the executor, and the merger. Exit code is the failed
//! unit count (capped at 250), 251 for fatal orchestration errors, 252 when
//! the run was cancelled.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod args;
mod output;

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use pabot_core::PlanItem;
use pabot_engine::{discover, merge, Executor, RuntimeError, SubprocessRunner};
use pabot_server::{listener, Registry, ServerConfig, ServerHandle};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::args::ArgsError;
use crate::output::render_summary;

/// Fatal orchestration error (broken plan, unspawnable worker).
const EXIT_FATAL: i32 = 251;

/// Run terminated by cancellation.
const EXIT_CANCELLED: i32 = 252;

#[tokio::main]
async fn main() {
    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match args::parse(argv) {
        Ok(parsed) => parsed,
        Err(ArgsError::Clap(e)) => e.exit(),
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FATAL;
        }
    };

    init_tracing(parsed.config.verbose);

    let mut config = parsed.config;
    let mut server: Option<ServerHandle> = None;
    if parsed.pabotlib {
        if is_local_host(&parsed.pabotlibhost) {
            let server_config = ServerConfig {
                host: parsed.pabotlibhost.clone(),
                port: parsed.pabotlibport,
                resource_file: parsed.resourcefile.clone(),
            };
            let registry = Arc::new(Mutex::new(Registry::new()));
            match listener::start(&server_config, registry).await {
                Ok(handle) => {
                    config.lib_uri = handle.uri();
                    server = Some(handle);
                }
                Err(e) => {
                    eprintln!("error: cannot start coordination server: {e}");
                    return EXIT_FATAL;
                }
            }
        } else {
            // A remote coordination server is already running elsewhere;
            // just tell the workers where it is.
            config.lib_uri = format!("tcp://{}:{}", parsed.pabotlibhost, parsed.pabotlibport);
        }
    }

    let items = match discover(&config, &parsed.discovery).await {
        Ok(items) => items,
        Err(e) => {
            eprintln!("error: {e}");
            shutdown_server(server).await;
            return EXIT_FATAL;
        }
    };
    let unit_count = items
        .iter()
        .filter(|i| matches!(i, PlanItem::Unit(_)))
        .count();
    if unit_count == 0 {
        warn!("nothing to run");
    }
    config.processes = parsed.processes.resolve(unit_count);
    info!(
        units = unit_count,
        processes = config.processes,
        pabotlib = %config.lib_uri,
        "starting run"
    );

    let shutdown = Arc::new(Notify::new());
    spawn_signal_task(Arc::clone(&shutdown));

    let config = Arc::new(config);
    let started = Instant::now();
    let run_output = Executor::new(Arc::clone(&config), SubprocessRunner, items)
        .run(Arc::clone(&shutdown))
        .await;

    let mut merge_failed = false;
    if config.no_rebot {
        info!("--no-rebot set, leaving per-unit outputs in place");
    } else {
        match merge(
            &config.results_dir,
            &config.output_dir,
            &run_output.merge_inputs,
            &run_output.artifact_mapping,
        ) {
            Ok(path) => info!(path = %path.display(), "report consolidated"),
            Err(e) => {
                eprintln!("merge error: {e}");
                merge_failed = true;
            }
        }
    }

    print!(
        "{}",
        render_summary(&run_output.stats, started.elapsed(), config.verbose)
    );

    shutdown_server(server).await;

    match run_output.fatal {
        Some(RuntimeError::Cancelled(reason)) => {
            eprintln!("run cancelled: {reason}");
            EXIT_CANCELLED
        }
        Some(e) => {
            eprintln!("error: {e}");
            EXIT_FATAL
        }
        None => {
            let code = run_output.stats.exit_code();
            if code == 0 && merge_failed {
                1
            } else {
                code
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Whether the configured coordination host is this machine, in which case
/// the server is embedded in-process.
fn is_local_host(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "localhost" | "0.0.0.0" | "::1")
}

fn spawn_signal_task(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("interrupt received"),
            _ = sigterm.recv() => warn!("termination requested"),
        }
        shutdown.notify_one();
    });
}

async fn shutdown_server(server: Option<ServerHandle>) {
    if let Some(server) = server {
        server.shutdown().await;
    }
}
