// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency resolution over a parsed plan.
//!
//! `#DEPENDS` names are matched against the fully-qualified names of
//! top-level units. Group members are not individually dispatchable, so they
//! are not valid dependency targets.

use crate::parser::PlanError;
use pabot_core::{PlanItem, UnitId};
use std::collections::HashMap;

/// Resolve dependency names to unit ids in place, then reject cycles.
pub fn resolve(items: &mut [PlanItem]) -> Result<(), PlanError> {
    let mut by_name: HashMap<&str, Vec<UnitId>> = HashMap::new();
    for item in items.iter() {
        if let PlanItem::Unit(unit) = item {
            by_name.entry(unit.name.as_str()).or_default().push(unit.id);
        }
    }

    // Borrow gymnastics: compute resolved id lists first, then write back.
    let mut resolved: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
    for item in items.iter() {
        let PlanItem::Unit(unit) = item else { continue };
        if unit.depends_names.is_empty() {
            continue;
        }
        let mut ids = Vec::with_capacity(unit.depends_names.len());
        for name in &unit.depends_names {
            match by_name.get(name.as_str()).map(Vec::as_slice) {
                None | Some([]) => {
                    return Err(PlanError::UnresolvedDependency {
                        unit: unit.name.clone(),
                        name: name.clone(),
                    });
                }
                Some([id]) => ids.push(*id),
                Some(_) => {
                    return Err(PlanError::AmbiguousDependency {
                        unit: unit.name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
        resolved.insert(unit.id, ids);
    }

    for item in items.iter_mut() {
        if let PlanItem::Unit(unit) = item {
            if let Some(ids) = resolved.remove(&unit.id) {
                unit.depends = ids;
            }
        }
    }

    detect_cycle(items)
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// DFS cycle detection over the dependency edges.
fn detect_cycle(items: &[PlanItem]) -> Result<(), PlanError> {
    let mut edges: HashMap<UnitId, &[UnitId]> = HashMap::new();
    let mut names: HashMap<UnitId, &str> = HashMap::new();
    let mut order: Vec<UnitId> = Vec::new();
    for item in items {
        if let PlanItem::Unit(unit) = item {
            edges.insert(unit.id, unit.depends.as_slice());
            names.insert(unit.id, unit.name.as_str());
            order.push(unit.id);
        }
    }

    let mut marks: HashMap<UnitId, Mark> = order.iter().map(|id| (*id, Mark::Unvisited)).collect();
    let mut stack: Vec<UnitId> = Vec::new();

    for start in &order {
        if marks[start] == Mark::Unvisited {
            visit(*start, &edges, &mut marks, &mut stack, &names)?;
        }
    }
    Ok(())
}

fn visit(
    id: UnitId,
    edges: &HashMap<UnitId, &[UnitId]>,
    marks: &mut HashMap<UnitId, Mark>,
    stack: &mut Vec<UnitId>,
    names: &HashMap<UnitId, &str>,
) -> Result<(), PlanError> {
    marks.insert(id, Mark::InProgress);
    stack.push(id);

    for dep in edges.get(&id).copied().unwrap_or_default() {
        match marks.get(dep).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => {}
            Mark::InProgress => {
                // Reconstruct the cycle path from the DFS stack.
                let from = stack.iter().position(|s| s == dep).unwrap_or(0);
                let mut cycle: Vec<String> = stack[from..]
                    .iter()
                    .map(|s| names.get(s).copied().unwrap_or("?").to_string())
                    .collect();
                cycle.push(names.get(dep).copied().unwrap_or("?").to_string());
                return Err(PlanError::DependencyCycle { cycle });
            }
            Mark::Unvisited => visit(*dep, edges, marks, stack, names)?,
        }
    }

    stack.pop();
    marks.insert(id, Mark::Done);
    Ok(())
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
