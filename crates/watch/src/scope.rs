// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relation scope membership watcher.
//!
//! Watches the scope documents under one relation prefix and emits
//! `{entered, left}` diffs. Membership state is held as the
//! last-delivered base set plus an undelivered diff: an `add` cancels a
//! pending removal and a `remove` cancels a pending add, so bursts that
//! net to no change emit nothing. A configured ignore name (the
//! observer's own unit) is filtered out unconditionally.

use crate::coalesce;
use crate::env;
use crate::error::WatchError;
use crate::hub::Hub;
use crate::watcher::{impl_watcher, Core, Ctx};
use lookout_core::{global_id, local_id, ScopeEvent, ScopeKey};
use lookout_store::{collections, ChangeEvent, IdFilter, StateStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Watcher emitting relation scope membership diffs.
pub struct ScopeWatcher {
    core: Core<ScopeEvent>,
}

impl_watcher!(ScopeWatcher, ScopeEvent);

pub(crate) struct ScopeParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    pub model: String,
    /// Local scope prefix, e.g. `"r#0#db"`.
    pub prefix: String,
    /// Unit name never reported, typically the observer's own unit.
    pub ignore: String,
}

impl ScopeWatcher {
    pub(crate) fn spawn<S: StateStore>(params: ScopeParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

/// Last-delivered membership plus the undelivered delta.
#[derive(Debug, Default)]
pub(crate) struct ScopeInfo {
    base: HashSet<String>,
    /// `true` = entered since the last delivery, `false` = left.
    diff: HashMap<String, bool>,
}

impl ScopeInfo {
    pub(crate) fn add(&mut self, name: &str) {
        if self.base.contains(name) {
            self.diff.remove(name);
        } else {
            self.diff.insert(name.to_string(), true);
        }
    }

    pub(crate) fn remove(&mut self, name: &str) {
        if self.base.contains(name) {
            self.diff.insert(name.to_string(), false);
        } else {
            self.diff.remove(name);
        }
    }

    pub(crate) fn has_changes(&self) -> bool {
        !self.diff.is_empty()
    }

    /// The undelivered delta. `entered` and `left` are disjoint by
    /// construction.
    pub(crate) fn event(&self) -> ScopeEvent {
        let mut event = ScopeEvent::default();
        for (name, &entered) in &self.diff {
            if entered {
                event.entered.push(name.clone());
            } else {
                event.left.push(name.clone());
            }
        }
        event.entered.sort();
        event.left.sort();
        event
    }

    /// Fold the delta into the base set after a successful delivery.
    pub(crate) fn commit(&mut self) {
        for (name, entered) in self.diff.drain() {
            if entered {
                self.base.insert(name);
            } else {
                self.base.remove(&name);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn in_scope(&self, name: &str) -> bool {
        match self.diff.get(name) {
            Some(&entered) => entered,
            None => self.base.contains(name),
        }
    }
}

async fn run<S: StateStore>(params: ScopeParams<S>, ctx: Ctx<ScopeEvent>) -> Result<(), WatchError> {
    let ScopeParams { hub, store, model, prefix, ignore } = params;
    let dead = hub.dead();
    let window = env::coalesce_window();

    // Scope documents for this relation share the stored id prefix
    // "<model>:<prefix>#".
    let stored_prefix = format!("{}#", global_id(&model, &prefix));
    let filter: IdFilter = {
        let stored_prefix = stored_prefix.clone();
        Arc::new(move |id: &str| id.starts_with(&stored_prefix))
    };

    let (tx, mut inbox) = mpsc::channel(env::sink_buffer());
    let sub = hub.watch_collection_filtered(collections::RELATION_SCOPES, tx, filter).await?;

    let result = async {
        let mut info = ScopeInfo::default();
        for key in store.scope_members(&stored_prefix).await? {
            if key.unit != ignore {
                info.add(&key.unit);
            }
        }

        let mut initial_due = true;
        loop {
            if initial_due || info.has_changes() {
                tokio::select! {
                    _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                    _ = dead.cancelled() => return Err(hub.death_error()),
                    maybe = inbox.recv() => match maybe {
                        Some(first) => {
                            merge(first, &mut inbox, window, &store, &model, &ignore, &mut info, &ctx)
                                .await?
                        }
                        None => return Err(hub.death_error()),
                    },
                    permit = ctx.out.reserve() => match permit {
                        Ok(permit) => {
                            permit.send(info.event());
                            info.commit();
                            initial_due = false;
                        }
                        Err(_) => return Err(WatchError::Cancelled),
                    },
                }
            } else {
                tokio::select! {
                    _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                    _ = dead.cancelled() => return Err(hub.death_error()),
                    maybe = inbox.recv() => match maybe {
                        Some(first) => {
                            merge(first, &mut inbox, window, &store, &model, &ignore, &mut info, &ctx)
                                .await?
                        }
                        None => return Err(hub.death_error()),
                    },
                }
            }
        }
    }
    .await;
    hub.unwatch(sub);
    result
}

#[allow(clippy::too_many_arguments)]
async fn merge<S: StateStore>(
    first: ChangeEvent,
    inbox: &mut mpsc::Receiver<ChangeEvent>,
    window: std::time::Duration,
    store: &Arc<S>,
    model: &str,
    ignore: &str,
    info: &mut ScopeInfo,
    ctx: &Ctx<ScopeEvent>,
) -> Result<(), WatchError> {
    let Some(burst) = coalesce::collect(first, inbox, window, &ctx.kill).await else {
        return Err(WatchError::Cancelled);
    };
    for (stored, exists) in burst {
        let Some(local) = local_id(model, &stored) else {
            warn!(id = %stored, "scope event for id outside model");
            continue;
        };
        let key = match ScopeKey::parse(local) {
            Ok(key) => key,
            Err(err) => {
                warn!(id = %stored, %err, "malformed scope key in change event");
                continue;
            }
        };
        if key.unit == ignore {
            continue;
        }
        if !exists {
            info.remove(&key.unit);
            continue;
        }
        // A present document with the departing flag set counts as out
        // of scope; one gone missing between the event and this read
        // counts as removed.
        match store.scope_departing(&stored).await? {
            Some(false) => info.add(&key.unit),
            Some(true) | None => info.remove(&key.unit),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
