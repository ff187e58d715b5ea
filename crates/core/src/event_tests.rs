// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn scope_event_emptiness() {
    assert!(ScopeEvent::default().is_empty());
    let event = ScopeEvent { entered: vec!["wordpress/0".into()], left: vec![] };
    assert!(!event.is_empty());
}

#[test]
fn relation_units_event_emptiness() {
    assert!(RelationUnitsEvent::default().is_empty());
    let mut event = RelationUnitsEvent::default();
    event.departed.push("mysql/1".into());
    assert!(!event.is_empty());
}

#[test]
fn relation_units_event_serde_shape() {
    let mut event = RelationUnitsEvent::default();
    event.changed.insert("mysql/0".into(), UnitSettings { version: 7 });
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["changed"]["mysql/0"]["version"], 7);
}
