// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatchable work items and plan items.
//!
//! A [`Unit`] is one dispatch: a suite, a single test, or a group of
//! suites/tests sharing a subprocess. [`PlanItem`]s are what the ordering
//! parser emits in document order.

use crate::id::UnitId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a dispatchable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// A whole suite, selected with `--suite`.
    Suite,
    /// A single test, selected with `--test`.
    Test,
    /// An ordered bundle of suites/tests run sequentially in one subprocess.
    Group,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Suite => write!(f, "suite"),
            UnitKind::Test => write!(f, "test"),
            UnitKind::Group => write!(f, "group"),
        }
    }
}

/// One dispatchable work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Stable id assigned at plan expansion.
    pub id: UnitId,
    pub kind: UnitKind,
    /// Fully-qualified dotted name. Synthesized from member names for groups.
    pub name: String,
    /// Extra command-line fragments (argument-file flags, overrides).
    #[serde(default)]
    pub args: Vec<String>,
    /// Argument-file variant index, when this unit is one of several
    /// argument-file expansions of the same name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argfile: Option<usize>,
    /// Dependency names as written in the plan (`#DEPENDS`).
    #[serde(default)]
    pub depends_names: Vec<String>,
    /// Dependency ids after resolution.
    #[serde(default)]
    pub depends: Vec<UnitId>,
    /// Startup delay in seconds, attached from a preceding `#SLEEP`.
    #[serde(default)]
    pub sleep: u64,
    /// Members of a group unit, executed sequentially. Empty otherwise.
    #[serde(default)]
    pub members: Vec<Unit>,
}

impl Unit {
    /// Create a suite unit.
    pub fn suite(id: UnitId, name: impl Into<String>) -> Self {
        Self {
            id,
            kind: UnitKind::Suite,
            name: name.into(),
            args: Vec::new(),
            argfile: None,
            depends_names: Vec::new(),
            depends: Vec::new(),
            sleep: 0,
            members: Vec::new(),
        }
    }

    /// Create a test unit.
    pub fn test(id: UnitId, name: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Test,
            ..Self::suite(id, name)
        }
    }

    /// Create a group unit from its members.
    ///
    /// The group name is synthesized by joining member names.
    pub fn group(id: UnitId, members: Vec<Unit>) -> Self {
        let name = synthesize_group_name(&members);
        Self {
            id,
            kind: UnitKind::Group,
            name,
            args: Vec::new(),
            argfile: None,
            depends_names: Vec::new(),
            depends: Vec::new(),
            sleep: 0,
            members,
        }
    }

    /// The runner selector flag for this unit kind.
    ///
    /// Groups have no single selector; their members carry their own.
    pub fn selector_flag(&self) -> Option<&'static str> {
        match self.kind {
            UnitKind::Suite => Some("--suite"),
            UnitKind::Test => Some("--test"),
            UnitKind::Group => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Join member names into a group name, `Group_<a>_<b>_...`.
fn synthesize_group_name(members: &[Unit]) -> String {
    let mut name = String::from("Group");
    for m in members {
        name.push('_');
        name.push_str(&m.name);
    }
    name
}

/// A parsed item of the execution plan, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanItem {
    /// A dispatchable unit (suite, test, or group).
    Unit(Unit),
    /// Total barrier: nothing after it starts until everything before completes.
    WaitBarrier,
    /// Startup delay hint that attaches to the next unit or group.
    SleepHint(u64),
}

impl PlanItem {
    /// The contained unit, if any.
    pub fn as_unit(&self) -> Option<&Unit> {
        match self {
            PlanItem::Unit(u) => Some(u),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;
