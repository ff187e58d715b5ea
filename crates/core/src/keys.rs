// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document identity: model-scoped ids and relation scope keys.
//!
//! Stored document ids are namespaced with a model prefix,
//! `"<model-uuid>:<local-id>"`. Watchers strip the prefix before exposing
//! names to callers; [`global_id`] and [`local_id`] are pure inverses for
//! ids belonging to the same model.

use thiserror::Error;

/// Errors from parsing structured keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("malformed scope key {0:?}")]
    MalformedScopeKey(String),
}

/// Build the stored id of a document from its model and local id.
pub fn global_id(model: &str, local: &str) -> String {
    format!("{model}:{local}")
}

/// Strip the model prefix from a stored id.
///
/// Returns `None` when the id belongs to a different model (or carries no
/// model prefix at all).
pub fn local_id<'a>(model: &str, global: &'a str) -> Option<&'a str> {
    global.strip_prefix(model)?.strip_prefix(':')
}

/// Identifies a unit's participation in a relation scope.
///
/// Wire form is `"<prefix>#<unit-name>"`. The prefix names the relation
/// scope and may itself contain `#` separators; the unit name follows the
/// final `#` and never contains one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub prefix: String,
    pub unit: String,
}

impl ScopeKey {
    pub fn new(prefix: impl Into<String>, unit: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), unit: unit.into() }
    }

    /// Parse a scope key from its wire form.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let (prefix, unit) = s
            .rsplit_once('#')
            .ok_or_else(|| KeyError::MalformedScopeKey(s.to_string()))?;
        if prefix.is_empty() || unit.is_empty() {
            return Err(KeyError::MalformedScopeKey(s.to_string()));
        }
        Ok(Self::new(prefix, unit))
    }

    /// The wire form, `"<prefix>#<unit-name>"`.
    pub fn encoded(&self) -> String {
        format!("{}#{}", self.prefix, self.unit)
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.prefix, self.unit)
    }
}

/// Local id of a machine's reboot-event document.
pub fn reboot_key(machine: &str) -> String {
    format!("m#{machine}")
}

/// Local id of a machine's opened-ports document.
pub fn ports_key(machine: &str) -> String {
    format!("m#{machine}#ports")
}

/// Recover the machine id from an opened-ports document id.
pub fn machine_from_ports_key(key: &str) -> Option<&str> {
    key.strip_prefix("m#")?.strip_suffix("#ports")
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
