// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watcher-visible event payloads

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parsed settings content: arbitrary JSON fields keyed by name.
pub type Settings = BTreeMap<String, serde_json::Value>;

/// Membership delta emitted by a relation scope watcher.
///
/// Within a single event, `entered` and `left` are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEvent {
    pub entered: Vec<String>,
    pub left: Vec<String>,
}

impl ScopeEvent {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

/// Settings version of one counterpart unit in a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSettings {
    pub version: i64,
}

/// Delta emitted by a relation-units watcher.
///
/// `changed` carries the current settings version for units that entered
/// scope or whose settings changed; `departed` lists units that left.
/// The two never overlap within one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationUnitsEvent {
    pub changed: BTreeMap<String, UnitSettings>,
    pub departed: Vec<String>,
}

impl RelationUnitsEvent {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.departed.is_empty()
    }
}

/// Projection of a status document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub since: Option<i64>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
