// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pabotd - standalone coordination server
//!
//! Serves the pabot coordination protocol (locks, shared values, value-set
//! leasing, run-once) over TCP for workers on other hosts. The `pabot` CLI
//! embeds the same server in-process; this binary exists for remote setups
//! where tests coordinate across machines.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use pabot_server::{listener, Registry, ServerConfig};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

const USAGE: &str = "\
USAGE:
    pabotd [OPTIONS]

OPTIONS:
    --host HOST            Bind address (default 127.0.0.1)
    --port PORT            Bind port (default 8270)
    --resourcefile PATH    Value-set resource file to serve
    -h, --help             Print help information
    -v, --version          Print version information";

fn parse_args() -> Result<ServerConfig, String> {
    let mut config = ServerConfig::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("pabotd {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" | "help" => {
                println!("pabotd {}", env!("CARGO_PKG_VERSION"));
                println!("pabot coordination server\n");
                println!("{USAGE}");
                std::process::exit(0);
            }
            "--host" => {
                config.host = args.next().ok_or("--host requires a value")?;
            }
            "--port" => {
                let value = args.next().ok_or("--port requires a value")?;
                config.port = value
                    .parse()
                    .map_err(|_| format!("invalid port: {value}"))?;
            }
            "--resourcefile" => {
                config.resource_file =
                    Some(PathBuf::from(args.next().ok_or("--resourcefile requires a value")?));
            }
            other => {
                return Err(format!("unexpected argument '{other}'"));
            }
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match parse_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(host = %config.host, port = config.port, "starting pabotd");

    let registry = Arc::new(Mutex::new(Registry::new()));
    let server = listener::start(&config, registry).await?;
    println!("pabotd listening on {}", server.uri());

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = sigterm.recv() => info!("terminated"),
    }

    server.shutdown().await;
    Ok(())
}
