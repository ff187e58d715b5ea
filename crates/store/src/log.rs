// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw change-log events pushed by the store

use crate::error::StoreError;

/// Collection names used by the state layer.
pub mod collections {
    pub const MACHINES: &str = "machines";
    pub const APPLICATIONS: &str = "applications";
    pub const UNITS: &str = "units";
    pub const RELATION_SCOPES: &str = "relation_scopes";
    pub const SETTINGS: &str = "settings";
    pub const STATUSES: &str = "statuses";
    pub const REBOOT_EVENTS: &str = "reboot_events";
    pub const OPENED_PORTS: &str = "opened_ports";
}

/// Revision value meaning "the document no longer exists".
pub const REV_ABSENT: i64 = -1;

/// One raw entry from the store's change log, in commit order.
///
/// Ids are opaque to the change hub; watchers interpret them. Revisions
/// are per-document and monotonically increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub revision: i64,
}

impl ChangeEvent {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, revision: i64) -> Self {
        Self { collection: collection.into(), id: id.into(), revision }
    }

    /// Whether the document still exists at this revision.
    pub fn exists(&self) -> bool {
        self.revision != REV_ABSENT
    }
}

/// The single connection to the change log, consumed by the change hub.
///
/// An `Err` item is a fatal log failure; the channel closing without one
/// means the store was shut down cleanly.
pub type ChangeStream = tokio::sync::mpsc::UnboundedReceiver<Result<ChangeEvent, StoreError>>;
