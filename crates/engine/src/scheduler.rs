// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch state machine.
//!
//! Sans-IO: the scheduler decides *what* to do next and the executor owns
//! the tokio wiring. State transitions happen in two places only:
//! [`Scheduler::next_actions`] pops plan items into dispatches while slots
//! are free, and [`Scheduler::on_completed`] releases a slot and re-examines
//! dependency-blocked units.
//!
//! Ordering guarantees:
//! - plan order modulo dependency deferrals and the pool bound
//! - a wait barrier stops dispatch until every running worker drains
//! - dependency-blocked units are carried across barriers and dispatched
//!   once their dependencies pass
//! - a failed dependency cascades: transitive dependents are skipped

use pabot_core::{OutcomeKind, PlanItem, Unit, UnitId, UnitOutcome};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// One unit ready to spawn.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub unit: Unit,
    pub queue_index: usize,
    pub pool_id: usize,
    /// Startup delay; the worker sleeps in its own slot.
    pub sleep: u64,
}

/// What the executor should do next.
#[derive(Debug)]
pub enum Action {
    /// Spawn a worker for this dispatch.
    Spawn(Dispatch),
    /// Record this unit as skipped without spawning anything.
    Skip(UnitOutcome),
}

/// Dispatch state machine over an ordered plan.
#[derive(Debug)]
pub struct Scheduler {
    /// Worker slots; `Some(id)` while a unit runs in that slot.
    slots: Vec<Option<UnitId>>,
    pending: VecDeque<PlanItem>,
    /// Units whose dependencies were not yet satisfied at pop time.
    blocked: Vec<Unit>,
    /// Units whose dependencies have since passed, ahead of `pending`.
    ready: VecDeque<Unit>,
    completed: HashMap<UnitId, OutcomeKind>,
    names: HashMap<UnitId, String>,
    barrier_active: bool,
    next_queue_index: usize,
    pending_sleep: Option<u64>,
}

impl Scheduler {
    /// Create a scheduler over a resolved plan with `pool_size` worker slots.
    pub fn new(pool_size: usize, items: Vec<PlanItem>) -> Self {
        let names = items
            .iter()
            .filter_map(PlanItem::as_unit)
            .map(|u| (u.id, u.name.clone()))
            .collect();
        Self {
            slots: vec![None; pool_size.max(1)],
            pending: items.into(),
            blocked: Vec::new(),
            ready: VecDeque::new(),
            completed: HashMap::new(),
            names,
            barrier_active: false,
            next_queue_index: 0,
            pending_sleep: None,
        }
    }

    /// Number of currently running workers.
    pub fn running(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when nothing is running and nothing can be dispatched anymore.
    pub fn is_done(&self) -> bool {
        self.running() == 0
            && self.pending.is_empty()
            && self.ready.is_empty()
            && self.blocked.is_empty()
    }

    /// Pop as many actions as free slots and the plan allow.
    pub fn next_actions(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        loop {
            if self.barrier_active {
                if self.running() > 0 {
                    break;
                }
                debug!("wait barrier cleared");
                self.barrier_active = false;
            }

            let Some(slot) = self.free_slot() else { break };

            if let Some(unit) = self.ready.pop_front() {
                actions.push(self.dispatch(unit, slot));
                continue;
            }

            match self.pending.pop_front() {
                None => break,
                Some(PlanItem::WaitBarrier) => {
                    if let Some(dropped) = self.pending_sleep.take() {
                        warn!(dropped, "discarding #SLEEP not followed by a unit");
                    }
                    debug!("wait barrier active");
                    self.barrier_active = true;
                }
                Some(PlanItem::SleepHint(secs)) => {
                    if let Some(dropped) = self.pending_sleep.replace(secs) {
                        warn!(dropped, "discarding #SLEEP not followed by a unit");
                    }
                }
                Some(PlanItem::Unit(mut unit)) => {
                    if let Some(secs) = self.pending_sleep.take() {
                        unit.sleep = secs;
                    }
                    match self.dependency_state(&unit) {
                        DepState::Satisfied => actions.push(self.dispatch(unit, slot)),
                        DepState::Failed(dep) => {
                            actions.push(self.skip(unit, &dep));
                            actions.extend(self.revisit_blocked());
                        }
                        DepState::Waiting => {
                            debug!(unit = %unit, "unit blocked on dependencies");
                            self.blocked.push(unit);
                        }
                    }
                }
            }
        }

        actions
    }

    /// Record a completion, free the slot, and surface newly skipped units.
    pub fn on_completed(&mut self, id: UnitId, kind: OutcomeKind) -> Vec<Action> {
        for slot in self.slots.iter_mut() {
            if *slot == Some(id) {
                *slot = None;
            }
        }
        self.completed.insert(id, kind);
        self.revisit_blocked()
    }

    /// Drop everything not yet running; used when draining after a fatal
    /// error or a signal. Pending and blocked units are discarded.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
        self.ready.clear();
        self.blocked.clear();
        self.pending_sleep = None;
        self.barrier_active = false;
    }

    /// Re-examine blocked units after a completion or a skip.
    ///
    /// Iterates to fixpoint: a cascade skip marks the unit completed, which
    /// may fail (or satisfy) further blocked units in the next round.
    fn revisit_blocked(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        loop {
            let mut progressed = false;
            let mut index = 0;
            while index < self.blocked.len() {
                match self.dependency_state(&self.blocked[index]) {
                    DepState::Satisfied => {
                        let unit = self.blocked.remove(index);
                        debug!(unit = %unit, "dependencies satisfied");
                        self.ready.push_back(unit);
                        progressed = true;
                    }
                    DepState::Failed(dep) => {
                        let unit = self.blocked.remove(index);
                        actions.push(self.skip(unit, &dep));
                        progressed = true;
                    }
                    DepState::Waiting => index += 1,
                }
            }
            if !progressed {
                return actions;
            }
        }
    }

    /// Skip a unit, recording it completed so dependents cascade too.
    fn skip(&mut self, unit: Unit, dep: &str) -> Action {
        warn!(unit = %unit, dependency = dep, "skipping unit, dependency did not pass");
        let outcome = UnitOutcome::skipped(unit.id, unit.name.clone(), dep);
        self.completed.insert(
            unit.id,
            OutcomeKind::Skipped {
                blocked_on: dep.to_string(),
            },
        );
        Action::Skip(outcome)
    }

    fn dispatch(&mut self, unit: Unit, slot: usize) -> Action {
        let queue_index = self.next_queue_index;
        self.next_queue_index += 1;
        self.slots[slot] = Some(unit.id);
        let sleep = unit.sleep;
        debug!(unit = %unit, queue_index, pool_id = slot, sleep, "dispatching");
        Action::Spawn(Dispatch {
            unit,
            queue_index,
            pool_id: slot,
            sleep,
        })
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    fn dependency_state(&self, unit: &Unit) -> DepState {
        for dep in &unit.depends {
            match self.completed.get(dep) {
                None => return DepState::Waiting,
                Some(kind) if kind.is_passing() => {}
                Some(_) => {
                    let name = self
                        .names
                        .get(dep)
                        .cloned()
                        .unwrap_or_else(|| dep.to_string());
                    return DepState::Failed(name);
                }
            }
        }
        DepState::Satisfied
    }
}

enum DepState {
    Satisfied,
    Waiting,
    Failed(String),
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
