// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The listener runs in a spawned task, accepting connections and handling
//! each in its own task. All registry access goes through one mutex, so
//! every operation is a serialized mutation regardless of how many
//! connections are open.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{Request, Response};
use crate::protocol_wire::{self, ProtocolError, WRITE_TIMEOUT};
use crate::registry::{LockAcquire, Registry, RunOnce};
use crate::resource::load_resource_file;
use crate::{DEFAULT_HOST, DEFAULT_PORT};

/// How often the reaper checks caller liveness.
const REAP_INTERVAL: Duration = Duration::from_secs(5);

/// Server bind configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub resource_file: Option<std::path::PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            resource_file: None,
        }
    }
}

/// Running coordination server.
///
/// Dropping the handle leaves the server running; call [`ServerHandle::shutdown`]
/// for an orderly stop.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the server actually bound (port 0 resolves here).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The URI advertised to workers via `PABOTLIBURI`.
    pub fn uri(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    /// Stop accepting connections and wait for the listener to exit.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "listener task did not exit cleanly");
        }
    }
}

/// Bind and start serving. State is fresh per invocation apart from value
/// sets seeded from the resource file.
pub async fn start(
    config: &ServerConfig,
    registry: Arc<Mutex<Registry>>,
) -> std::io::Result<ServerHandle> {
    if let Some(path) = &config.resource_file {
        let sets = load_resource_file(path).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        info!(path = %path.display(), sets = sets.len(), "loaded resource file");
        registry.lock().load_value_sets(sets);
    }

    let socket = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = socket.local_addr()?;
    info!(%addr, "coordination server listening");

    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(run(socket, Arc::clone(&registry), Arc::clone(&shutdown)));

    Ok(ServerHandle {
        addr,
        shutdown,
        task,
    })
}

/// Accept loop; exits on shutdown notification.
async fn run(socket: TcpListener, registry: Arc<Mutex<Registry>>, shutdown: Arc<Notify>) {
    let mut reap_tick = tokio::time::interval(REAP_INTERVAL);
    reap_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("coordination server shutting down");
                return;
            }
            _ = reap_tick.tick() => {
                registry.lock().reap_dead(std::time::Instant::now());
            }
            accepted = socket.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "client connected");
                        let registry = Arc::clone(&registry);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &registry).await {
                                match e {
                                    ProtocolError::ConnectionClosed => debug!(%peer, "client disconnected"),
                                    ProtocolError::Timeout => warn!(%peer, "connection timeout"),
                                    _ => error!(%peer, error = %e, "connection error"),
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                    }
                }
            }
        }
    }
}

/// Handle one client connection: many request/response lines until EOF.
async fn handle_connection(
    stream: TcpStream,
    registry: &Mutex<Registry>,
) -> Result<(), ProtocolError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let request = match protocol_wire::read_request(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::Json(e)) => {
                // Malformed lines get an error response; the connection stays up.
                warn!(error = %e, "malformed request line");
                let response = Response::error(
                    crate::protocol::ErrorKind::BadRequest,
                    format!("malformed request: {e}"),
                );
                protocol_wire::write_response(&mut writer, &response, WRITE_TIMEOUT).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        debug!(request = ?request, "received request");
        let response = handle_request(&request, registry);
        protocol_wire::write_response(&mut writer, &response, WRITE_TIMEOUT).await?;
    }
}

/// Apply one request to the registry.
///
/// The registry lock is held for the duration of the match, which is the
/// serialization point for all coordination semantics.
fn handle_request(request: &Request, registry: &Mutex<Registry>) -> Response {
    let now = std::time::Instant::now();
    let mut reg = registry.lock();

    // Every request carrying a caller id refreshes its liveness.
    if let Some(caller) = request.caller() {
        reg.touch(caller, now);
    }

    match request {
        Request::Register { .. } | Request::Ping { .. } => Response::Ok,

        Request::Deregister { caller } => {
            reg.deregister(caller);
            Response::Ok
        }

        Request::AcquireLock { name, caller } => match reg.acquire_lock(name, caller) {
            LockAcquire::Granted => Response::Ok,
            LockAcquire::Queued => Response::Retry,
        },

        Request::ReleaseLock { name, caller } => match reg.release_lock(name, caller) {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e.kind(), e.to_string()),
        },

        Request::SetParallelValue { key, value } => {
            reg.set_parallel_value(key, value);
            Response::Ok
        }

        Request::GetParallelValue { key } => Response::Value {
            value: reg.get_parallel_value(key),
        },

        Request::AcquireValueSet { tag, caller } => {
            match reg.acquire_value_set(tag.as_deref(), caller) {
                Ok(name) => Response::Value { value: name },
                Err(e) => Response::error(e.kind(), e.to_string()),
            }
        }

        Request::GetValueFromSet { key, caller } => match reg.get_value_from_set(key, caller) {
            Ok(value) => Response::Value { value },
            Err(e) => Response::error(e.kind(), e.to_string()),
        },

        Request::ReleaseValueSet { caller } => {
            reg.release_value_set(caller);
            Response::Ok
        }

        Request::AddValueToSet { name, values } => {
            reg.add_value_set(name, values.clone());
            Response::Ok
        }

        Request::RunOnlyOnce { id, caller } => match reg.run_only_once(id, caller) {
            RunOnce::First => Response::First,
            RunOnce::AlreadyDone => Response::Already,
            RunOnce::Pending => Response::Retry,
        },

        Request::MarkRunDone { id, caller } => match reg.mark_run_done(id, caller) {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e.kind(), e.to_string()),
        },
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
