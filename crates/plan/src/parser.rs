// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan grammar parsing.
//!
//! One item per line, surrounding whitespace ignored:
//!
//! ```text
//! --suite NAME
//! --test NAME [#DEPENDS NAME]...
//! #WAIT
//! #SLEEP n
//! { ... }
//! ```
//!
//! Blank lines and lines that start with none of the recognized markers are
//! ignored. Recognized but malformed lines are errors.

use pabot_core::{PlanItem, Unit, UnitId};
use thiserror::Error;

/// Maximum accepted `#SLEEP` value in seconds.
pub const MAX_SLEEP_SECS: u64 = 3600;

/// Errors from plan parsing and dependency resolution.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("line {line_no}: malformed plan line: {message}")]
    MalformedLine { line_no: usize, message: String },

    #[error("line {line_no}: #SLEEP value {value} outside 0..={max}", max = MAX_SLEEP_SECS)]
    SleepOutOfRange { line_no: usize, value: String },

    #[error("line {line_no}: groups cannot be nested")]
    NestedGroup { line_no: usize },

    #[error("line {line_no}: '}}' without an open group")]
    UnbalancedGroup { line_no: usize },

    #[error("group opened on line {line_no} is never closed")]
    UnclosedGroup { line_no: usize },

    #[error("line {line_no}: group is empty")]
    EmptyGroup { line_no: usize },

    #[error("unit {unit} depends on unknown unit {name}")]
    UnresolvedDependency { unit: String, name: String },

    #[error("unit {unit} depends on {name}, which names more than one unit")]
    AmbiguousDependency { unit: String, name: String },

    #[error("dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
}

/// Parse plan body text into items in document order.
///
/// Unit ids are assigned monotonically from 0 in order of appearance, group
/// members included, so the same text always yields the same ids.
pub fn parse_items(text: &str) -> Result<Vec<PlanItem>, PlanError> {
    let mut items = Vec::new();
    let mut next_id: u64 = 0;
    let mut group: Option<GroupBuilder> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if line == "{" {
            if group.is_some() {
                return Err(PlanError::NestedGroup { line_no });
            }
            group = Some(GroupBuilder::new(line_no));
            continue;
        }

        if line == "}" {
            let builder = group
                .take()
                .ok_or(PlanError::UnbalancedGroup { line_no })?;
            items.push(PlanItem::Unit(builder.finish(&mut next_id)?));
            continue;
        }

        let Some(parsed) = parse_line(line, line_no, &mut next_id)? else {
            tracing::debug!(line_no, line, "ignoring unrecognized plan line");
            continue;
        };

        match group.as_mut() {
            Some(builder) => builder.push(parsed, line_no)?,
            None => items.push(parsed),
        }
    }

    if let Some(builder) = group {
        return Err(PlanError::UnclosedGroup {
            line_no: builder.open_line,
        });
    }

    Ok(items)
}

/// Render items back to canonical plan text.
///
/// The canonical form is what discovery writes to the cache; parsing it
/// yields an identical item list.
pub fn render_items(items: &[PlanItem]) -> String {
    let mut out = String::new();
    for item in items {
        render_item(item, &mut out);
    }
    out
}

fn render_item(item: &PlanItem, out: &mut String) {
    match item {
        PlanItem::WaitBarrier => out.push_str("#WAIT\n"),
        PlanItem::SleepHint(n) => out.push_str(&format!("#SLEEP {}\n", n)),
        PlanItem::Unit(unit) if unit.members.is_empty() => render_unit(unit, out),
        PlanItem::Unit(group) => {
            out.push_str("{\n");
            for member in &group.members {
                render_unit(member, out);
            }
            out.push_str("}\n");
        }
    }
}

fn render_unit(unit: &Unit, out: &mut String) {
    match unit.selector_flag() {
        Some(flag) => {
            out.push_str(flag);
            out.push(' ');
            out.push_str(&unit.name);
        }
        None => out.push_str(&unit.name),
    }
    for dep in &unit.depends_names {
        out.push_str(" #DEPENDS ");
        out.push_str(dep);
    }
    out.push('\n');
}

/// Parse a single non-group line. `Ok(None)` means the line is ignored.
fn parse_line(
    line: &str,
    line_no: usize,
    next_id: &mut u64,
) -> Result<Option<PlanItem>, PlanError> {
    if let Some(rest) = directive(line, "--suite") {
        let name = rest.trim();
        if name.is_empty() {
            return Err(PlanError::MalformedLine {
                line_no,
                message: "--suite requires a name".to_string(),
            });
        }
        if name.contains("#DEPENDS") {
            return Err(PlanError::MalformedLine {
                line_no,
                message: "#DEPENDS is only valid on --test lines".to_string(),
            });
        }
        let unit = Unit::suite(take_id(next_id), name);
        return Ok(Some(PlanItem::Unit(unit)));
    }

    if let Some(rest) = directive(line, "--test") {
        let mut fields = rest.split("#DEPENDS");
        let name = fields.next().unwrap_or("").trim();
        if name.is_empty() {
            return Err(PlanError::MalformedLine {
                line_no,
                message: "--test requires a name".to_string(),
            });
        }
        let mut unit = Unit::test(take_id(next_id), name);
        for dep in fields {
            let dep = dep.trim();
            if dep.is_empty() {
                return Err(PlanError::MalformedLine {
                    line_no,
                    message: "#DEPENDS requires a name".to_string(),
                });
            }
            unit.depends_names.push(dep.to_string());
        }
        return Ok(Some(PlanItem::Unit(unit)));
    }

    if line == "#WAIT" {
        return Ok(Some(PlanItem::WaitBarrier));
    }

    if let Some(rest) = directive(line, "#SLEEP") {
        let value = rest.trim();
        let secs: u64 = value.parse().map_err(|_| PlanError::SleepOutOfRange {
            line_no,
            value: value.to_string(),
        })?;
        if secs > MAX_SLEEP_SECS {
            return Err(PlanError::SleepOutOfRange {
                line_no,
                value: value.to_string(),
            });
        }
        return Ok(Some(PlanItem::SleepHint(secs)));
    }

    Ok(None)
}

/// Match `marker` as a whole word: the line must continue with whitespace
/// (so `--suite` never swallows a `--suitesfrom` line) or end there.
fn directive<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(marker)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn take_id(next_id: &mut u64) -> UnitId {
    let id = UnitId::new(*next_id);
    *next_id += 1;
    id
}

/// Accumulates members while inside `{ ... }`.
struct GroupBuilder {
    open_line: usize,
    members: Vec<Unit>,
}

impl GroupBuilder {
    fn new(open_line: usize) -> Self {
        Self {
            open_line,
            members: Vec::new(),
        }
    }

    fn push(&mut self, item: PlanItem, line_no: usize) -> Result<(), PlanError> {
        match item {
            PlanItem::Unit(unit) => {
                // Members are not individually dispatched, so nothing could
                // ever enforce a dependency edge on one.
                if !unit.depends_names.is_empty() {
                    return Err(PlanError::MalformedLine {
                        line_no,
                        message: "#DEPENDS is not allowed inside a group".to_string(),
                    });
                }
                self.members.push(unit);
            }
            // The whole group is one runner invocation; there is no seam
            // between members where a delay could be injected.
            PlanItem::SleepHint(dropped) => {
                tracing::warn!(line_no, dropped, "discarding #SLEEP inside group");
            }
            // Members already run sequentially; a barrier inside a group
            // changes nothing.
            PlanItem::WaitBarrier => {
                tracing::debug!(line_no, "#WAIT inside a group has no effect");
            }
        }
        Ok(())
    }

    fn finish(self, next_id: &mut u64) -> Result<Unit, PlanError> {
        if self.members.is_empty() {
            return Err(PlanError::EmptyGroup {
                line_no: self.open_line,
            });
        }
        Ok(Unit::group(take_id(next_id), self.members))
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
