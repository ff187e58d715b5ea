// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relation-units watcher.
//!
//! Composes a scope watcher with a per-member settings watch. When a
//! counterpart unit enters scope its settings document is read and a
//! keyed subscription is registered; every member subscription feeds one
//! shared updates inbox. The emitted delta maps unit names to their
//! current settings version, plus the units that departed.
//!
//! Cancellation stops the inner scope watcher and waits for it before
//! the outer channel closes, so the inner watcher is never left blocked
//! on a final send.

use crate::env;
use crate::error::WatchError;
use crate::hub::{Hub, SubHandle};
use crate::scope::{ScopeParams, ScopeWatcher};
use crate::watcher::{impl_watcher, Core, Ctx, Watcher};
use lookout_core::{global_id, local_id, RelationUnitsEvent, ScopeKey, UnitSettings};
use lookout_store::{collections, ChangeEvent, StateStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Watcher emitting settings-version deltas for a relation's
/// counterpart units.
pub struct RelationUnitsWatcher {
    core: Core<RelationUnitsEvent>,
}

impl_watcher!(RelationUnitsWatcher, RelationUnitsEvent);

pub(crate) struct RelationUnitsParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    pub model: String,
    /// Local scope prefix, e.g. `"r#0#db"`.
    pub prefix: String,
    /// Unit name never reported, typically the observer's own unit.
    pub ignore: String,
}

impl RelationUnitsWatcher {
    pub(crate) fn spawn<S: StateStore>(params: RelationUnitsParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

async fn run<S: StateStore>(
    params: RelationUnitsParams<S>,
    ctx: Ctx<RelationUnitsEvent>,
) -> Result<(), WatchError> {
    let RelationUnitsParams { hub, store, model, prefix, ignore } = params;
    let mut inner = ScopeWatcher::spawn(ScopeParams {
        hub: hub.clone(),
        store: Arc::clone(&store),
        model: model.clone(),
        prefix: prefix.clone(),
        ignore,
    });
    let (updates_tx, mut updates) = mpsc::channel(env::sink_buffer());
    let mut watched: HashMap<String, SubHandle> = HashMap::new();

    let result = watch(
        &hub,
        &store,
        &model,
        &prefix,
        &mut inner,
        updates_tx,
        &mut updates,
        &mut watched,
        &ctx,
    )
    .await;

    // Stop inner, then wait for it, then let our own channel close.
    inner.kill();
    let _ = inner.wait().await;
    for (_, handle) in watched.drain() {
        hub.unwatch(handle);
    }
    result
}

#[allow(clippy::too_many_arguments)]
async fn watch<S: StateStore>(
    hub: &Hub,
    store: &Arc<S>,
    model: &str,
    prefix: &str,
    inner: &mut ScopeWatcher,
    updates_tx: mpsc::Sender<ChangeEvent>,
    updates: &mut mpsc::Receiver<ChangeEvent>,
    watched: &mut HashMap<String, SubHandle>,
    ctx: &Ctx<RelationUnitsEvent>,
) -> Result<(), WatchError> {
    let dead = hub.dead();
    let mut pending = RelationUnitsEvent::default();
    // The first scope event carries the initial membership; our first
    // event is due as soon as it has been folded in, even when empty.
    let mut initial_seen = false;
    let mut initial_sent = false;

    loop {
        let emit_due = (initial_seen && !initial_sent) || (initial_sent && !pending.is_empty());
        if emit_due {
            tokio::select! {
                _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                _ = dead.cancelled() => return Err(hub.death_error()),
                maybe = inner.changes().recv() => match maybe {
                    Some(event) => {
                        scope_changed(event, hub, store, model, prefix, &updates_tx, watched, &mut pending)
                            .await?;
                        initial_seen = true;
                    }
                    None => return Err(inner_failure(inner)),
                },
                maybe = updates.recv() => match maybe {
                    Some(ev) => settings_changed(ev, model, watched, &mut pending)?,
                    None => return Err(hub.death_error()),
                },
                permit = ctx.out.reserve() => match permit {
                    Ok(permit) => {
                        permit.send(std::mem::take(&mut pending));
                        initial_sent = true;
                    }
                    Err(_) => return Err(WatchError::Cancelled),
                },
            }
        } else {
            tokio::select! {
                _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                _ = dead.cancelled() => return Err(hub.death_error()),
                maybe = inner.changes().recv() => match maybe {
                    Some(event) => {
                        scope_changed(event, hub, store, model, prefix, &updates_tx, watched, &mut pending)
                            .await?;
                        initial_seen = true;
                    }
                    None => return Err(inner_failure(inner)),
                },
                maybe = updates.recv() => match maybe {
                    Some(ev) => settings_changed(ev, model, watched, &mut pending)?,
                    None => return Err(hub.death_error()),
                },
            }
        }
    }
}

/// Terminal error when the inner scope watcher's channel closes on us.
fn inner_failure(inner: &ScopeWatcher) -> WatchError {
    match inner.err() {
        Some(err) if !err.is_cancelled() => err,
        _ => WatchError::StoreClosed,
    }
}

#[allow(clippy::too_many_arguments)]
async fn scope_changed<S: StateStore>(
    event: lookout_core::ScopeEvent,
    hub: &Hub,
    store: &Arc<S>,
    model: &str,
    prefix: &str,
    updates_tx: &mpsc::Sender<ChangeEvent>,
    watched: &mut HashMap<String, SubHandle>,
    pending: &mut RelationUnitsEvent,
) -> Result<(), WatchError> {
    for unit in event.entered {
        let key = ScopeKey::new(prefix, unit.as_str());
        let stored = global_id(model, &key.encoded());
        // The relation guarantees settings exist while the unit is in
        // scope; their absence here is a broken invariant.
        let Some(doc) = store.settings(&stored).await? else {
            return Err(WatchError::SettingsMissing(key.encoded()));
        };
        let handle = hub
            .watch_doc(collections::SETTINGS, &stored, doc.revision, updates_tx.clone())
            .await?;
        if let Some(stale) = watched.insert(unit.clone(), handle) {
            hub.unwatch(stale);
        }
        pending.changed.insert(unit.clone(), UnitSettings { version: doc.revision });
        pending.departed.retain(|name| name != &unit);
    }
    for unit in event.left {
        if let Some(handle) = watched.remove(&unit) {
            hub.unwatch(handle);
        }
        pending.changed.remove(&unit);
        if !pending.departed.contains(&unit) {
            pending.departed.push(unit);
        }
    }
    Ok(())
}

fn settings_changed(
    ev: ChangeEvent,
    model: &str,
    watched: &HashMap<String, SubHandle>,
    pending: &mut RelationUnitsEvent,
) -> Result<(), WatchError> {
    let Some(local) = local_id(model, &ev.id) else {
        warn!(id = %ev.id, "settings event for id outside model");
        return Ok(());
    };
    let key = match ScopeKey::parse(local) {
        Ok(key) => key,
        Err(err) => {
            warn!(id = %ev.id, %err, "malformed settings key in change event");
            return Ok(());
        }
    };
    if !watched.contains_key(&key.unit) {
        // Tail event from a subscription dropped moments ago.
        return Ok(());
    }
    if !ev.exists() {
        return Err(WatchError::SettingsMissing(key.encoded()));
    }
    pending.changed.insert(key.unit, UnitSettings { version: ev.revision });
    Ok(())
}

#[cfg(test)]
#[path = "relation_units_tests.rs"]
mod tests;
