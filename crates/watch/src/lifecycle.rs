// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle watcher: tracks a filtered set of documents' lifecycle.
//!
//! The first event is the set of local ids of all currently non-dead
//! members; each later event lists the ids whose lifecycle changed —
//! added, advanced, or removed. An id reported in a terminal state is
//! never reported again unless the document is recreated.

use crate::coalesce;
use crate::env;
use crate::error::WatchError;
use crate::hub::Hub;
use crate::watcher::{impl_watcher, Core, Ctx};
use lookout_core::{local_id, Life};
use lookout_store::{ChangeEvent, IdFilter, StateStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Strings watcher emitting ids whose lifecycle changed.
pub struct LifecycleWatcher {
    core: Core<Vec<String>>,
}

impl_watcher!(LifecycleWatcher, Vec<String>);

pub(crate) struct LifecycleParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    pub model: String,
    pub collection: String,
    /// Selects both the initial members and the change events; applied
    /// to stored ids.
    pub filter: IdFilter,
}

impl LifecycleWatcher {
    pub(crate) fn spawn<S: StateStore>(params: LifecycleParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

struct Tracker<S> {
    store: Arc<S>,
    model: String,
    collection: String,
    /// Lifecycle of every non-terminal member already reported.
    life: HashMap<String, Life>,
    pending: Vec<String>,
}

impl<S: StateStore> Tracker<S> {
    /// Merge one coalesced burst of raw events, requerying lifecycle for
    /// the possibly-present ids in one batch.
    async fn merge(&mut self, burst: HashMap<String, bool>) -> Result<(), WatchError> {
        let present: Vec<String> =
            burst.iter().filter(|&(_, exists)| *exists).map(|(id, _)| id.clone()).collect();
        let lives = self.store.lives_of(&self.collection, &present).await?;

        for (stored, _) in burst {
            let Some(local) = local_id(&self.model, &stored) else {
                warn!(id = %stored, "change event for id outside model");
                continue;
            };
            // Ids missing from the requery no longer exist.
            let current = lives.get(&stored).copied();
            self.apply(local, current);
        }
        Ok(())
    }

    fn apply(&mut self, local: &str, current: Option<Life>) {
        match (self.life.get(local).copied(), current) {
            // Never appeared alive; nothing to report.
            (None, None) => {}
            (None, Some(life)) => {
                if !life.is_terminal() {
                    self.life.insert(local.to_string(), life);
                    self.note(local);
                }
            }
            (Some(_), None) => {
                self.life.remove(local);
                self.note(local);
            }
            (Some(known), Some(life)) => {
                if life.is_terminal() {
                    self.life.remove(local);
                    self.note(local);
                } else if known != life {
                    self.life.insert(local.to_string(), life);
                    self.note(local);
                }
            }
        }
    }

    fn note(&mut self, local: &str) {
        if !self.pending.iter().any(|p| p == local) {
            self.pending.push(local.to_string());
        }
    }
}

async fn run<S: StateStore>(
    params: LifecycleParams<S>,
    ctx: Ctx<Vec<String>>,
) -> Result<(), WatchError> {
    let LifecycleParams { hub, store, model, collection, filter } = params;
    let dead = hub.dead();
    let (tx, mut inbox) = mpsc::channel(env::sink_buffer());
    let sub = hub.watch_collection_filtered(&collection, tx, Arc::clone(&filter)).await?;

    let mut tracker = Tracker {
        store,
        model,
        collection: collection.clone(),
        life: HashMap::new(),
        pending: Vec::new(),
    };
    let result = watch(&hub, &dead, &mut inbox, &filter, &mut tracker, &ctx).await;
    hub.unwatch(sub);
    result
}

async fn watch<S: StateStore>(
    hub: &Hub,
    dead: &tokio_util::sync::CancellationToken,
    inbox: &mut mpsc::Receiver<ChangeEvent>,
    filter: &IdFilter,
    tracker: &mut Tracker<S>,
    ctx: &Ctx<Vec<String>>,
) -> Result<(), WatchError> {
    let window = env::coalesce_window();

    for (stored, life) in tracker.store.lives_matching(&tracker.collection, filter).await? {
        if !life.is_terminal() {
            let Some(local) = local_id(&tracker.model, &stored) else {
                warn!(id = %stored, "initial member outside model");
                continue;
            };
            tracker.life.insert(local.to_string(), life);
            tracker.note(local);
        }
    }

    // The initial event is due even when the member set is empty.
    let mut initial_due = true;
    loop {
        if initial_due || !tracker.pending.is_empty() {
            tokio::select! {
                _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                _ = dead.cancelled() => return Err(hub.death_error()),
                maybe = inbox.recv() => match maybe {
                    Some(first) => merge_burst(first, inbox, window, tracker, ctx).await?,
                    None => return Err(hub.death_error()),
                },
                permit = ctx.out.reserve() => match permit {
                    Ok(permit) => {
                        permit.send(std::mem::take(&mut tracker.pending));
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
                    Some(first) => merge_burst(first, inbox, window, tracker, ctx).await?,
                    None => return Err(hub.death_error()),
                },
            }
        }
    }
}

async fn merge_burst<S: StateStore>(
    first: ChangeEvent,
    inbox: &mut mpsc::Receiver<ChangeEvent>,
    window: std::time::Duration,
    tracker: &mut Tracker<S>,
    ctx: &Ctx<Vec<String>>,
) -> Result<(), WatchError> {
    match coalesce::collect(first, inbox, window, &ctx.kill).await {
        Some(burst) => tracker.merge(burst).await,
        None => Err(WatchError::Cancelled),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
