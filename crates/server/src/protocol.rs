// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response model for the coordination protocol.
//!
//! Wire format: one JSON object per LF-terminated line (see
//! [`crate::protocol_wire`]). The encoding is stable and documented so that
//! test-side bindings in other languages can speak it: a request is
//! `{"op": "<operation>", ...arguments}`, a response is
//! `{"status": "ok" | "value" | "retry" | "first" | "already" | "error", ...}`.

use pabot_core::CallerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request from a worker to the coordination server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Announce a caller; starts liveness tracking.
    Register { caller: CallerId },

    /// Liveness heartbeat.
    Ping { caller: CallerId },

    /// Orderly goodbye; releases everything the caller holds.
    Deregister { caller: CallerId },

    /// Acquire a named lock, or join its wait queue.
    AcquireLock { name: String, caller: CallerId },

    /// Release a held lock; the head waiter becomes the holder.
    ReleaseLock { name: String, caller: CallerId },

    /// Upsert a shared key/value pair.
    SetParallelValue { key: String, value: String },

    /// Read a shared value; missing keys read as the empty string.
    GetParallelValue { key: String },

    /// Lease a free value set, optionally restricted to a tag.
    AcquireValueSet {
        #[serde(default)]
        tag: Option<String>,
        caller: CallerId,
    },

    /// Read a value from the set currently leased by the caller.
    GetValueFromSet { key: String, caller: CallerId },

    /// Release the caller's value-set lease; no-op without one.
    ReleaseValueSet { caller: CallerId },

    /// Insert a value set at runtime. A `tags` key in the mapping becomes
    /// the set's comma-separated tag list.
    AddValueToSet {
        name: String,
        values: HashMap<String, String>,
    },

    /// Test-and-set an identifier. The first caller gets `first` and must
    /// later send [`Request::MarkRunDone`]; everyone else long-polls until
    /// it does, then gets `already`.
    RunOnlyOnce { id: String, caller: CallerId },

    /// Report completion of a `run_only_once` claim.
    MarkRunDone { id: String, caller: CallerId },
}

impl Request {
    /// The caller this request is from, when it names one.
    pub fn caller(&self) -> Option<&CallerId> {
        match self {
            Request::Register { caller }
            | Request::Ping { caller }
            | Request::Deregister { caller }
            | Request::AcquireLock { caller, .. }
            | Request::ReleaseLock { caller, .. }
            | Request::AcquireValueSet { caller, .. }
            | Request::GetValueFromSet { caller, .. }
            | Request::ReleaseValueSet { caller }
            | Request::RunOnlyOnce { caller, .. }
            | Request::MarkRunDone { caller, .. } => Some(caller),
            Request::SetParallelValue { .. }
            | Request::GetParallelValue { .. }
            | Request::AddValueToSet { .. } => None,
        }
    }
}

/// Machine-readable error kinds surfaced to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Every matching value set is currently leased; try again later.
    NoValueSetAvailable,
    /// No value set carries the requested tag at all.
    NoSuchTag,
    /// The leased value set has no value for the key.
    NoSuchKey,
    /// Releasing a lock the caller does not hold.
    ReleaseWithoutAcquire,
    /// Acquiring a value set while already holding a lease.
    AcquireWithoutRelease,
    /// Reading from a value set without holding a lease.
    NoValueSetAcquired,
    /// Malformed or inapplicable request.
    BadRequest,
}

/// Response to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Operation applied.
    Ok,

    /// Operation applied, with a result value (shared values, set names).
    Value { value: String },

    /// Contended: the caller is enqueued and should retry shortly.
    Retry,

    /// `run_only_once`: this caller is the first; it must run and then
    /// report `mark_run_done`.
    First,

    /// `run_only_once`: another caller already ran this id to completion.
    Already,

    /// Operation failed.
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
