// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory document store with a commit-ordered change log.
//!
//! `MemStore` backs the watcher tests and demos: every mutator bumps the
//! touched document's revision and appends a [`ChangeEvent`] to the log,
//! in the order the mutations commit. Mutators take local (model-relative)
//! ids; reads implement [`StateStore`] over stored ids.

use crate::docs::{MachineUnits, SettingsDoc, StatusDoc, UnitAttachment};
use crate::error::StoreError;
use crate::log::{collections, ChangeEvent, ChangeStream, REV_ABSENT};
use crate::store::{IdFilter, StateStore};
use lookout_core::{global_id, Life, ScopeKey, Settings};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type LogSender = mpsc::UnboundedSender<Result<ChangeEvent, StoreError>>;

/// In-memory store; reference implementation of [`StateStore`].
pub struct MemStore {
    model: String,
    inner: Mutex<Inner>,
}

struct Inner {
    collections: HashMap<String, HashMap<String, Doc>>,
    log: Option<LogSender>,
}

struct Doc {
    revision: i64,
    body: Body,
}

enum Body {
    App { life: Life },
    Unit { life: Life, machine: Option<String>, subordinates: Vec<String> },
    Machine { life: Life, units: Vec<String> },
    Scope { departing: bool },
    Settings { content: Settings },
    Status { status: String, message: String, since: Option<i64> },
    Marker,
}

impl Body {
    fn life(&self) -> Option<Life> {
        match self {
            Body::App { life } | Body::Unit { life, .. } | Body::Machine { life, .. } => {
                Some(*life)
            }
            _ => None,
        }
    }

    fn life_mut(&mut self) -> Option<&mut Life> {
        match self {
            Body::App { life } | Body::Unit { life, .. } | Body::Machine { life, .. } => {
                Some(life)
            }
            _ => None,
        }
    }
}

impl MemStore {
    /// Create a store for one model, returning the change stream the hub
    /// will consume.
    pub fn new(model: impl Into<String>) -> (Arc<Self>, ChangeStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(Self {
            model: model.into(),
            inner: Mutex::new(Inner { collections: HashMap::new(), log: Some(tx) }),
        });
        (store, rx)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stored id of a document with the given local id.
    pub fn stored_id(&self, local: &str) -> String {
        global_id(&self.model, local)
    }

    // ---- mutators ------------------------------------------------------

    pub fn add_application(&self, name: &str, life: Life) {
        self.upsert(collections::APPLICATIONS, name, |_| Body::App { life });
    }

    pub fn add_machine(&self, id: &str) {
        self.upsert(collections::MACHINES, id, |_| Body::Machine {
            life: Life::Alive,
            units: Vec::new(),
        });
    }

    pub fn add_unit(&self, name: &str, life: Life) {
        self.upsert(collections::UNITS, name, |_| Body::Unit {
            life,
            machine: None,
            subordinates: Vec::new(),
        });
    }

    /// Create a subordinate unit alongside `principal`, on the same
    /// machine. Touches both documents.
    pub fn add_subordinate(&self, principal: &str, name: &str) {
        let machine = {
            let inner = self.inner.lock();
            let doc = inner
                .collections
                .get(collections::UNITS)
                .and_then(|d| d.get(&self.stored_id(principal)));
            match doc.map(|d| &d.body) {
                Some(Body::Unit { machine, .. }) => machine.clone(),
                _ => None,
            }
        };
        self.with_doc(collections::UNITS, principal, |doc| match &mut doc.body {
            Body::Unit { subordinates, .. } => {
                if subordinates.iter().any(|s| s == name) {
                    false
                } else {
                    subordinates.push(name.to_string());
                    true
                }
            }
            _ => false,
        });
        self.upsert(collections::UNITS, name, |_| Body::Unit {
            life: Life::Alive,
            machine,
            subordinates: Vec::new(),
        });
    }

    /// Advance a document's lifecycle. Backward transitions are ignored.
    pub fn set_life(&self, collection: &str, id: &str, life: Life) {
        self.with_doc(collection, id, |doc| {
            match doc.body.life_mut() {
                Some(current) if current.can_become(life) && *current != life => {
                    *current = life;
                    true
                }
                _ => false,
            }
        });
    }

    /// Remove a document; the log records revision `-1`.
    pub fn remove(&self, collection: &str, id: &str) {
        let stored = self.stored_id(id);
        let mut inner = self.inner.lock();
        let existed = inner
            .collections
            .get_mut(collection)
            .map(|docs| docs.remove(&stored).is_some())
            .unwrap_or(false);
        if existed {
            Self::append(&mut inner, collection, &stored, REV_ABSENT);
        }
    }

    /// Assign a principal unit to a machine. Touches both documents, so a
    /// single call commits a two-event burst.
    pub fn assign_unit(&self, machine: &str, unit: &str) {
        self.with_doc(collections::MACHINES, machine, |doc| match &mut doc.body {
            Body::Machine { units, .. } => {
                if !units.iter().any(|u| u == unit) {
                    units.push(unit.to_string());
                    return true;
                }
                false
            }
            _ => false,
        });
        let machine = machine.to_string();
        self.with_doc(collections::UNITS, unit, |doc| match &mut doc.body {
            Body::Unit { machine: slot, .. } if slot.as_deref() != Some(machine.as_str()) => {
                *slot = Some(machine);
                true
            }
            _ => false,
        });
    }

    pub fn unassign_unit(&self, machine: &str, unit: &str) {
        self.with_doc(collections::MACHINES, machine, |doc| match &mut doc.body {
            Body::Machine { units, .. } => {
                let before = units.len();
                units.retain(|u| u != unit);
                units.len() != before
            }
            _ => false,
        });
        self.with_doc(collections::UNITS, unit, |doc| match &mut doc.body {
            Body::Unit { machine: slot, .. } if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        });
    }

    pub fn enter_scope(&self, prefix: &str, unit: &str) {
        let key = ScopeKey::new(prefix, unit);
        self.upsert(collections::RELATION_SCOPES, &key.encoded(), |_| Body::Scope {
            departing: false,
        });
    }

    /// Mark a unit as about to leave the scope. The document remains.
    pub fn depart_scope(&self, prefix: &str, unit: &str) {
        let key = ScopeKey::new(prefix, unit);
        self.with_doc(collections::RELATION_SCOPES, &key.encoded(), |doc| match &mut doc.body {
            Body::Scope { departing } => {
                *departing = true;
                true
            }
            _ => false,
        });
    }

    pub fn leave_scope(&self, prefix: &str, unit: &str) {
        let key = ScopeKey::new(prefix, unit);
        self.remove(collections::RELATION_SCOPES, &key.encoded());
    }

    /// Upsert a settings document, returning its new revision.
    pub fn write_settings(&self, key: &str, content: Settings) -> i64 {
        self.upsert(collections::SETTINGS, key, |_| Body::Settings { content })
    }

    pub fn remove_settings(&self, key: &str) {
        self.remove(collections::SETTINGS, key);
    }

    pub fn set_status(&self, key: &str, status: &str, message: &str, since: Option<i64>) {
        self.upsert(collections::STATUSES, key, |_| Body::Status {
            status: status.to_string(),
            message: message.to_string(),
            since,
        });
    }

    pub fn request_reboot(&self, machine: &str) {
        self.upsert(collections::REBOOT_EVENTS, &lookout_core::reboot_key(machine), |_| {
            Body::Marker
        });
    }

    pub fn clear_reboot(&self, machine: &str) {
        self.remove(collections::REBOOT_EVENTS, &lookout_core::reboot_key(machine));
    }

    pub fn open_ports(&self, machine: &str) {
        self.upsert(collections::OPENED_PORTS, &lookout_core::ports_key(machine), |_| {
            Body::Marker
        });
    }

    pub fn close_ports(&self, machine: &str) {
        self.remove(collections::OPENED_PORTS, &lookout_core::ports_key(machine));
    }

    /// Inject a fatal change-log failure.
    pub fn fail(&self, err: StoreError) {
        let mut inner = self.inner.lock();
        if let Some(log) = inner.log.take() {
            let _ = log.send(Err(err));
        }
    }

    /// End the change log cleanly.
    pub fn close(&self) {
        self.inner.lock().log.take();
    }

    // ---- internals -----------------------------------------------------

    /// Replace or create a document, bump its revision, and log the
    /// commit. Returns the new revision.
    fn upsert(&self, collection: &str, local: &str, body: impl FnOnce(i64) -> Body) -> i64 {
        let stored = self.stored_id(local);
        let mut inner = self.inner.lock();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        let revision = docs.get(&stored).map(|d| d.revision + 1).unwrap_or(1);
        let doc = Doc { revision, body: body(revision) };
        docs.insert(stored.clone(), doc);
        Self::append(&mut inner, collection, &stored, revision);
        revision
    }

    /// Mutate a document in place; bumps and logs only when the closure
    /// reports a change.
    fn with_doc(&self, collection: &str, local: &str, f: impl FnOnce(&mut Doc) -> bool) {
        let stored = self.stored_id(local);
        let mut inner = self.inner.lock();
        let Some(doc) = inner.collections.get_mut(collection).and_then(|d| d.get_mut(&stored))
        else {
            return;
        };
        if f(doc) {
            doc.revision += 1;
            let revision = doc.revision;
            Self::append(&mut inner, collection, &stored, revision);
        }
    }

    fn append(inner: &mut Inner, collection: &str, stored: &str, revision: i64) {
        debug!(collection, id = stored, revision, "commit");
        if let Some(log) = &inner.log {
            let _ = log.send(Ok(ChangeEvent::new(collection, stored, revision)));
        }
    }
}

#[async_trait::async_trait]
impl StateStore for MemStore {
    async fn lives_matching(
        &self,
        collection: &str,
        filter: &IdFilter,
    ) -> Result<Vec<(String, Life)>, StoreError> {
        let inner = self.inner.lock();
        let Some(docs) = inner.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(id, _)| filter(id))
            .filter_map(|(id, doc)| doc.body.life().map(|life| (id.clone(), life)))
            .collect())
    }

    async fn lives_of(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Life>, StoreError> {
        let inner = self.inner.lock();
        let Some(docs) = inner.collections.get(collection) else {
            return Ok(HashMap::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                docs.get(id).and_then(|doc| doc.body.life()).map(|life| (id.clone(), life))
            })
            .collect())
    }

    async fn ids_matching(
        &self,
        collection: &str,
        filter: &IdFilter,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let Some(docs) = inner.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs.keys().filter(|id| filter(id)).cloned().collect())
    }

    async fn revision_of(&self, collection: &str, id: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.collections.get(collection).and_then(|docs| docs.get(id)).map(|d| d.revision))
    }

    async fn scope_members(&self, id_prefix: &str) -> Result<Vec<ScopeKey>, StoreError> {
        let inner = self.inner.lock();
        let Some(docs) = inner.collections.get(collections::RELATION_SCOPES) else {
            return Ok(Vec::new());
        };
        let mut members = Vec::new();
        for (id, doc) in docs {
            if !id.starts_with(id_prefix) {
                continue;
            }
            if let Body::Scope { departing: false } = doc.body {
                let Some(local) = lookout_core::local_id(&self.model, id) else {
                    warn!(id, "scope document outside model");
                    continue;
                };
                match ScopeKey::parse(local) {
                    Ok(key) => members.push(key),
                    Err(err) => return Err(StoreError::Corrupt(err.to_string())),
                }
            }
        }
        Ok(members)
    }

    async fn scope_departing(&self, id: &str) -> Result<Option<bool>, StoreError> {
        let inner = self.inner.lock();
        let doc = inner.collections.get(collections::RELATION_SCOPES).and_then(|d| d.get(id));
        Ok(doc.and_then(|doc| match doc.body {
            Body::Scope { departing } => Some(departing),
            _ => None,
        }))
    }

    async fn settings(&self, id: &str) -> Result<Option<SettingsDoc>, StoreError> {
        let inner = self.inner.lock();
        let doc = inner.collections.get(collections::SETTINGS).and_then(|d| d.get(id));
        Ok(doc.and_then(|doc| match &doc.body {
            Body::Settings { content } => {
                Some(SettingsDoc { revision: doc.revision, content: content.clone() })
            }
            _ => None,
        }))
    }

    async fn machine_units(&self, id: &str) -> Result<Option<MachineUnits>, StoreError> {
        let inner = self.inner.lock();
        let doc = inner.collections.get(collections::MACHINES).and_then(|d| d.get(id));
        Ok(doc.and_then(|doc| match &doc.body {
            Body::Machine { units, .. } => {
                Some(MachineUnits { revision: doc.revision, units: units.clone() })
            }
            _ => None,
        }))
    }

    async fn unit_attachment(&self, id: &str) -> Result<Option<UnitAttachment>, StoreError> {
        let inner = self.inner.lock();
        let doc = inner.collections.get(collections::UNITS).and_then(|d| d.get(id));
        Ok(doc.and_then(|doc| match &doc.body {
            Body::Unit { life, machine, subordinates } => Some(UnitAttachment {
                revision: doc.revision,
                machine: machine.clone(),
                life: *life,
                subordinates: subordinates.clone(),
            }),
            _ => None,
        }))
    }

    async fn status(&self, id: &str) -> Result<Option<StatusDoc>, StoreError> {
        let inner = self.inner.lock();
        let doc = inner.collections.get(collections::STATUSES).and_then(|d| d.get(id));
        Ok(doc.and_then(|doc| match &doc.body {
            Body::Status { status, message, since } => Some(StatusDoc {
                revision: doc.revision,
                status: status.clone(),
                message: message.clone(),
                since: *since,
            }),
            _ => None,
        }))
    }
}

#[cfg(test)]
#[path = "mem_tests.rs"]
mod tests;
