// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination state: locks, shared values, value-set leases, run-once.
//!
//! The registry is the single mutable state of the server. Every operation
//! is one synchronous method call under the listener's mutex, so all
//! mutations are serialized and the observable semantics are linearizable.

use crate::protocol::ErrorKind;
use crate::resource::ValueSetDef;
use indexmap::IndexMap;
use pabot_core::CallerId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// A caller is reaped after this long without a request.
pub const CALLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced to the calling worker. They never affect the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("lock {name} is not held by caller {caller}")]
    ReleaseWithoutAcquire { name: String, caller: CallerId },

    #[error("caller {caller} already holds value set {name}")]
    AcquireWithoutRelease { caller: CallerId, name: String },

    #[error("no value set tagged {tag}")]
    NoSuchTag { tag: String },

    #[error("all matching value sets are in use")]
    NoValueSetAvailable,

    #[error("caller {caller} holds no value set")]
    NoValueSetAcquired { caller: CallerId },

    #[error("no value for key {key} in value set {set}")]
    NoSuchKey { key: String, set: String },

    #[error("run-once id {id} is not claimed by caller {caller}")]
    NotRunOnceOwner { id: String, caller: CallerId },
}

impl RegistryError {
    /// Wire-level error kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::ReleaseWithoutAcquire { .. } => ErrorKind::ReleaseWithoutAcquire,
            RegistryError::AcquireWithoutRelease { .. } => ErrorKind::AcquireWithoutRelease,
            RegistryError::NoSuchTag { .. } => ErrorKind::NoSuchTag,
            RegistryError::NoValueSetAvailable => ErrorKind::NoValueSetAvailable,
            RegistryError::NoValueSetAcquired { .. } => ErrorKind::NoValueSetAcquired,
            RegistryError::NoSuchKey { .. } => ErrorKind::NoSuchKey,
            RegistryError::NotRunOnceOwner { .. } => ErrorKind::BadRequest,
        }
    }
}

/// Named binary semaphore with a FIFO wait queue.
#[derive(Debug, Default)]
struct Lock {
    holder: Option<CallerId>,
    wait_queue: VecDeque<CallerId>,
}

/// Named, tagged mapping leased exclusively to one caller at a time.
#[derive(Debug)]
pub struct ValueSet {
    pub name: String,
    pub tags: Vec<String>,
    pub values: IndexMap<String, String>,
    pub holder: Option<CallerId>,
}

impl ValueSet {
    fn matches_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquire {
    /// The caller now holds the lock.
    Granted,
    /// The lock is held; the caller is in the FIFO queue and should retry.
    Queued,
}

/// Result of a `run_only_once` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOnce {
    /// This caller claimed the id and must run the work.
    First,
    /// The first caller finished; skip the work.
    AlreadyDone,
    /// The first caller is still running; retry.
    Pending,
}

#[derive(Debug)]
struct RunOnceEntry {
    owner: CallerId,
    done: bool,
}

/// Process-wide coordination state, reset at server startup.
#[derive(Debug, Default)]
pub struct Registry {
    locks: HashMap<String, Lock>,
    parallel_values: HashMap<String, String>,
    value_sets: Vec<ValueSet>,
    run_once: HashMap<String, RunOnceEntry>,
    callers: HashMap<CallerId, Instant>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed value sets from a parsed resource file.
    pub fn load_value_sets(&mut self, defs: Vec<ValueSetDef>) {
        for def in defs {
            self.value_sets.push(ValueSet {
                name: def.name,
                tags: def.tags,
                values: def.values,
                holder: None,
            });
        }
    }

    // --- liveness ---

    /// Record that a caller was seen now.
    pub fn touch(&mut self, caller: &CallerId, now: Instant) {
        self.callers.insert(caller.clone(), now);
    }

    /// Orderly goodbye: releases everything the caller holds.
    pub fn deregister(&mut self, caller: &CallerId) {
        self.callers.remove(caller);
        self.release_holdings(caller);
    }

    /// Release the holdings of callers not seen within [`CALLER_TIMEOUT`].
    ///
    /// Returns the reaped caller ids.
    pub fn reap_dead(&mut self, now: Instant) -> Vec<CallerId> {
        let dead: Vec<CallerId> = self
            .callers
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > CALLER_TIMEOUT)
            .map(|(caller, _)| caller.clone())
            .collect();
        for caller in &dead {
            warn!(caller = %caller, "caller liveness expired, releasing holdings");
            self.callers.remove(caller);
            self.release_holdings(caller);
        }
        dead
    }

    /// Drop every lock, lease, and pending run-once claim of a caller.
    fn release_holdings(&mut self, caller: &CallerId) {
        for (name, lock) in self.locks.iter_mut() {
            lock.wait_queue.retain(|c| c != caller);
            if lock.holder.as_ref() == Some(caller) {
                lock.holder = lock.wait_queue.pop_front();
                debug!(lock = %name, next = ?lock.holder, "released lock of dead caller");
            }
        }
        for set in self.value_sets.iter_mut() {
            if set.holder.as_ref() == Some(caller) {
                set.holder = None;
                debug!(set = %set.name, "released value-set lease of dead caller");
            }
        }
        // Unfinished claims are dropped so another caller can retry the work.
        self.run_once
            .retain(|_, entry| entry.done || entry.owner != *caller);
    }

    // --- locks ---

    /// Acquire a named lock or join its FIFO wait queue.
    ///
    /// Re-acquiring a lock the caller already holds is granted (idempotent
    /// retry after a wake).
    pub fn acquire_lock(&mut self, name: &str, caller: &CallerId) -> LockAcquire {
        let lock = self.locks.entry(name.to_string()).or_default();
        match &lock.holder {
            None => {
                lock.holder = Some(caller.clone());
                LockAcquire::Granted
            }
            Some(holder) if holder == caller => LockAcquire::Granted,
            Some(_) => {
                if !lock.wait_queue.contains(caller) {
                    lock.wait_queue.push_back(caller.clone());
                }
                LockAcquire::Queued
            }
        }
    }

    /// Release a lock; the head waiter becomes holder atomically.
    pub fn release_lock(&mut self, name: &str, caller: &CallerId) -> Result<(), RegistryError> {
        let lock = self
            .locks
            .get_mut(name)
            .filter(|l| l.holder.as_ref() == Some(caller))
            .ok_or_else(|| RegistryError::ReleaseWithoutAcquire {
                name: name.to_string(),
                caller: caller.clone(),
            })?;
        lock.holder = lock.wait_queue.pop_front();
        Ok(())
    }

    #[cfg(test)]
    fn lock_holder(&self, name: &str) -> Option<&CallerId> {
        self.locks.get(name).and_then(|l| l.holder.as_ref())
    }

    // --- parallel key/value ---

    pub fn set_parallel_value(&mut self, key: &str, value: &str) {
        self.parallel_values
            .insert(key.to_string(), value.to_string());
    }

    /// Missing keys read as the empty string.
    pub fn get_parallel_value(&self, key: &str) -> String {
        self.parallel_values.get(key).cloned().unwrap_or_default()
    }

    // --- value sets ---

    /// Lease the first free value set matching `tag`, in insertion order.
    ///
    /// Returns the set name. With no tag, any free set is eligible.
    pub fn acquire_value_set(
        &mut self,
        tag: Option<&str>,
        caller: &CallerId,
    ) -> Result<String, RegistryError> {
        if let Some(held) = self
            .value_sets
            .iter()
            .find(|s| s.holder.as_ref() == Some(caller))
        {
            return Err(RegistryError::AcquireWithoutRelease {
                caller: caller.clone(),
                name: held.name.clone(),
            });
        }

        if let Some(tag) = tag {
            if !self.value_sets.iter().any(|s| s.matches_tag(tag)) {
                return Err(RegistryError::NoSuchTag {
                    tag: tag.to_string(),
                });
            }
        }

        let set = self
            .value_sets
            .iter_mut()
            .find(|s| s.holder.is_none() && tag.map_or(true, |t| s.matches_tag(t)))
            .ok_or(RegistryError::NoValueSetAvailable)?;
        set.holder = Some(caller.clone());
        Ok(set.name.clone())
    }

    /// Read a value from the caller's leased set; keys are matched
    /// ASCII-case-insensitively.
    pub fn get_value_from_set(
        &self,
        key: &str,
        caller: &CallerId,
    ) -> Result<String, RegistryError> {
        let set = self
            .value_sets
            .iter()
            .find(|s| s.holder.as_ref() == Some(caller))
            .ok_or_else(|| RegistryError::NoValueSetAcquired {
                caller: caller.clone(),
            })?;
        set.value(key)
            .map(str::to_string)
            .ok_or_else(|| RegistryError::NoSuchKey {
                key: key.to_string(),
                set: set.name.clone(),
            })
    }

    /// Clear the caller's lease; no-op without one.
    pub fn release_value_set(&mut self, caller: &CallerId) {
        for set in self.value_sets.iter_mut() {
            if set.holder.as_ref() == Some(caller) {
                set.holder = None;
            }
        }
    }

    /// Insert a value set at runtime. A `tags` key in the mapping becomes
    /// the comma-separated tag list.
    pub fn add_value_set(&mut self, name: &str, values: HashMap<String, String>) {
        let mut tags = Vec::new();
        let mut set_values = IndexMap::new();
        for (key, value) in values {
            if key.eq_ignore_ascii_case("tags") {
                tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            } else {
                set_values.insert(key, value);
            }
        }
        set_values.sort_keys();
        self.value_sets.push(ValueSet {
            name: name.to_string(),
            tags,
            values: set_values,
            holder: None,
        });
    }

    // --- run once ---

    /// Atomic test-and-set of a run-once identifier.
    pub fn run_only_once(&mut self, id: &str, caller: &CallerId) -> RunOnce {
        match self.run_once.get(id) {
            None => {
                self.run_once.insert(
                    id.to_string(),
                    RunOnceEntry {
                        owner: caller.clone(),
                        done: false,
                    },
                );
                RunOnce::First
            }
            Some(entry) if entry.done => RunOnce::AlreadyDone,
            // The owner re-asking before reporting completion keeps its claim.
            Some(entry) if entry.owner == *caller => RunOnce::First,
            Some(_) => RunOnce::Pending,
        }
    }

    /// Mark a run-once claim complete so pending callers get `already`.
    pub fn mark_run_done(&mut self, id: &str, caller: &CallerId) -> Result<(), RegistryError> {
        let entry = self
            .run_once
            .get_mut(id)
            .filter(|e| e.owner == *caller)
            .ok_or_else(|| RegistryError::NotRunOnceOwner {
                id: id.to_string(),
                caller: caller.clone(),
            })?;
        entry.done = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
