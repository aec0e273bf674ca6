// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pabot-server: coordination service for workers.
//!
//! A line-oriented JSON RPC service over TCP offering named locks, a shared
//! key/value store, tag-based value-set leasing, and run-once coordination.
//! Workers find it through the `PABOTLIBURI` environment variable.
//!
//! Architecture:
//! - Listener task: accepts connections, one spawned task per connection
//! - Registry: single mutable state behind a mutex; every request is one
//!   serialized mutation, which is what makes the operations linearizable

pub mod listener;
pub mod protocol;
pub mod protocol_wire;
pub mod registry;
pub mod resource;

pub use listener::{ServerConfig, ServerHandle};
pub use protocol::{ErrorKind, Request, Response};
pub use registry::{Registry, RegistryError};
pub use resource::{load_resource_file, parse_resource_file, ResourceError, ValueSetDef};

/// Default bind host for the coordination server.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port for the coordination server.
pub const DEFAULT_PORT: u16 = 8270;
