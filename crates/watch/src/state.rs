// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watcher factories over one model's state.

use crate::container::{MachineUnitsParams, MachineUnitsWatcher};
use crate::hub::Hub;
use crate::lifecycle::{LifecycleParams, LifecycleWatcher};
use crate::notify::{EntityParams, EntityWatcher};
use crate::relation_units::{RelationUnitsParams, RelationUnitsWatcher};
use crate::scope::{ScopeParams, ScopeWatcher};
use crate::settings::{SettingsParams, SettingsWatcher};
use crate::strings::{FilterParams, FilterWatcher};
use crate::variants::{StatusParams, StatusWatcher};
use lookout_core::{global_id, local_id, machine_from_ports_key, reboot_key};
use lookout_store::{collections, IdFilter, StateStore};
use std::sync::Arc;

/// Handle to one model's observable state: the hub, the store, and the
/// factory methods that create watchers.
pub struct State<S> {
    hub: Hub,
    store: Arc<S>,
    model: String,
}

impl<S: StateStore> State<S> {
    pub fn new(hub: Hub, store: Arc<S>, model: impl Into<String>) -> Self {
        Self { hub, store, model: model.into() }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Lifecycle watcher over every application in the model.
    pub fn watch_applications(&self) -> LifecycleWatcher {
        LifecycleWatcher::spawn(LifecycleParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            model: self.model.clone(),
            collection: collections::APPLICATIONS.to_string(),
            filter: self.in_model(),
        })
    }

    /// Lifecycle watcher over one application's units.
    pub fn watch_application_units(&self, application: &str) -> LifecycleWatcher {
        let prefix = format!("{application}/");
        LifecycleWatcher::spawn(LifecycleParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            model: self.model.clone(),
            collection: collections::UNITS.to_string(),
            filter: self.local_filter(move |local| local.starts_with(&prefix)),
        })
    }

    /// Strings watcher over one machine's units and their subordinates.
    pub fn watch_machine_units(&self, machine: &str) -> MachineUnitsWatcher {
        MachineUnitsWatcher::spawn(MachineUnitsParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            model: self.model.clone(),
            machine: machine.to_string(),
        })
    }

    /// Notify watcher over one document.
    pub fn watch_entity(&self, collection: &str, id: &str) -> EntityWatcher {
        EntityWatcher::spawn(EntityParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            collection: collection.to_string(),
            id: global_id(&self.model, id),
        })
    }

    /// Scope membership watcher for one relation, with the observer's
    /// own unit filtered out.
    pub fn watch_relation_scope(&self, prefix: &str, ignore: &str) -> ScopeWatcher {
        ScopeWatcher::spawn(ScopeParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            model: self.model.clone(),
            prefix: prefix.to_string(),
            ignore: ignore.to_string(),
        })
    }

    /// Relation-units watcher for one relation, with the observer's own
    /// unit filtered out.
    pub fn watch_relation_units(&self, prefix: &str, ignore: &str) -> RelationUnitsWatcher {
        RelationUnitsWatcher::spawn(RelationUnitsParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            model: self.model.clone(),
            prefix: prefix.to_string(),
            ignore: ignore.to_string(),
        })
    }

    /// Settings watcher for one settings document.
    pub fn watch_settings(&self, key: &str) -> SettingsWatcher {
        SettingsWatcher::spawn(SettingsParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            id: global_id(&self.model, key),
        })
    }

    /// Status watcher for one status document.
    pub fn watch_status(&self, key: &str) -> StatusWatcher {
        StatusWatcher::spawn(StatusParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            id: global_id(&self.model, key),
        })
    }

    /// Notify watcher for one machine's reboot-event document.
    pub fn watch_reboot(&self, machine: &str) -> EntityWatcher {
        self.watch_entity(collections::REBOOT_EVENTS, &reboot_key(machine))
    }

    /// Strings watcher emitting machine ids whose opened ports changed.
    pub fn watch_opened_ports(&self) -> FilterWatcher {
        let model = self.model.clone();
        FilterWatcher::spawn(FilterParams {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            collection: collections::OPENED_PORTS.to_string(),
            filter: self.local_filter(|local| machine_from_ports_key(local).is_some()),
            visible: Arc::new(move |stored| {
                local_id(&model, stored)
                    .and_then(machine_from_ports_key)
                    .map(|machine| machine.to_string())
            }),
        })
    }

    /// Filter accepting every stored id scoped to this model.
    fn in_model(&self) -> IdFilter {
        let model = self.model.clone();
        Arc::new(move |id: &str| local_id(&model, id).is_some())
    }

    /// Filter applying `pred` to the local part of stored ids in this
    /// model.
    fn local_filter(&self, pred: impl Fn(&str) -> bool + Send + Sync + 'static) -> IdFilter {
        let model = self.model.clone();
        Arc::new(move |id: &str| local_id(&model, id).map(&pred).unwrap_or(false))
    }
}
