// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn suite_and_test_constructors() {
    let s = Unit::suite(UnitId::new(1), "Top.Sub");
    assert_eq!(s.kind, UnitKind::Suite);
    assert_eq!(s.selector_flag(), Some("--suite"));
    assert_eq!(s.sleep, 0);

    let t = Unit::test(UnitId::new(2), "Top.Sub.Case");
    assert_eq!(t.kind, UnitKind::Test);
    assert_eq!(t.selector_flag(), Some("--test"));
}

#[test]
fn group_name_is_synthesized_from_members() {
    let members = vec![
        Unit::suite(UnitId::new(1), "Alpha"),
        Unit::suite(UnitId::new(2), "Beta"),
    ];
    let g = Unit::group(UnitId::new(3), members);
    assert_eq!(g.kind, UnitKind::Group);
    assert_eq!(g.name, "Group_Alpha_Beta");
    assert_eq!(g.members.len(), 2);
    assert_eq!(g.selector_flag(), None);
}

#[test]
fn display_shows_kind_and_name() {
    let t = Unit::test(UnitId::new(7), "Suite.Case");
    assert_eq!(t.to_string(), "test Suite.Case");
}

#[test]
fn plan_item_as_unit() {
    let item = PlanItem::Unit(Unit::suite(UnitId::new(1), "A"));
    assert!(item.as_unit().is_some());
    assert!(PlanItem::WaitBarrier.as_unit().is_none());
    assert!(PlanItem::SleepHint(5).as_unit().is_none());
}

#[test]
fn unit_serde_round_trip() {
    let mut t = Unit::test(UnitId::new(4), "S.T");
    t.depends_names.push("S.Other".to_string());
    t.sleep = 10;
    let json = serde_json::to_string(&t).unwrap();
    let back: Unit = serde_json::from_str(&json).unwrap();
    assert_eq!(t, back);
}
