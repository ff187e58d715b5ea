// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed projections of store documents.
//!
//! Only the fields that participate in watch semantics are modeled here;
//! the full attribute sets belong to the transactional CRUD layer.

use lookout_core::{Life, ScopeKey, Settings};
use serde::{Deserialize, Serialize};

/// Settings document: versioned configuration content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsDoc {
    pub revision: i64,
    pub content: Settings,
}

/// One unit's participation in a relation scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDoc {
    pub key: ScopeKey,
    /// Set when the unit is about to leave the scope.
    pub departing: bool,
}

/// Projection of a machine document for container watching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineUnits {
    pub revision: i64,
    /// Names of principal units assigned to the machine.
    pub units: Vec<String>,
}

/// Projection of a unit document for container watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAttachment {
    pub revision: i64,
    /// Machine the unit is assigned to, if any.
    pub machine: Option<String>,
    pub life: Life,
    /// Subordinate units deployed alongside this one.
    pub subordinates: Vec<String>,
}

/// Status document projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDoc {
    pub revision: i64,
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub since: Option<i64>,
}
