// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic filtered strings watcher.
//!
//! Emits caller-visible ids from one collection matching a pure
//! predicate, merging bursts across the coalesce window: a document that
//! appears adds its id to the pending change, one that disappears before
//! delivery withdraws it. The caller-visible id is derived from the
//! stored id by a domain-specific transform.

use crate::coalesce;
use crate::env;
use crate::error::WatchError;
use crate::hub::Hub;
use crate::watcher::{impl_watcher, Core, Ctx};
use lookout_store::{ChangeEvent, IdFilter, StateStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Maps a stored id to the name callers see; `None` drops the event.
pub(crate) type VisibleId = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Strings watcher over a filtered collection.
pub struct FilterWatcher {
    core: Core<Vec<String>>,
}

impl_watcher!(FilterWatcher, Vec<String>);

pub(crate) struct FilterParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    pub collection: String,
    /// Applied to stored ids, on the hub task and in the initial query.
    pub filter: IdFilter,
    pub visible: VisibleId,
}

impl FilterWatcher {
    pub(crate) fn spawn<S: StateStore>(params: FilterParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

async fn run<S: StateStore>(params: FilterParams<S>, ctx: Ctx<Vec<String>>) -> Result<(), WatchError> {
    let FilterParams { hub, store, collection, filter, visible } = params;
    let dead = hub.dead();
    let window = env::coalesce_window();
    let (tx, mut inbox) = mpsc::channel(env::sink_buffer());
    let sub = hub.watch_collection_filtered(&collection, tx, Arc::clone(&filter)).await?;

    let result = async {
        let mut pending: Vec<String> = Vec::new();
        for stored in store.ids_matching(&collection, &filter).await? {
            match visible(&stored) {
                Some(name) => {
                    if !pending.contains(&name) {
                        pending.push(name);
                    }
                }
                None => warn!(id = %stored, "unrecognized id in watched collection"),
            }
        }

        let mut initial_due = true;
        loop {
            if initial_due || !pending.is_empty() {
                tokio::select! {
                    _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                    _ = dead.cancelled() => return Err(hub.death_error()),
                    maybe = inbox.recv() => match maybe {
                        Some(first) => merge(first, &mut inbox, window, &visible, &mut pending, &ctx).await?,
                        None => return Err(hub.death_error()),
                    },
                    permit = ctx.out.reserve() => match permit {
                        Ok(permit) => {
                            permit.send(std::mem::take(&mut pending));
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
                        Some(first) => merge(first, &mut inbox, window, &visible, &mut pending, &ctx).await?,
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

async fn merge(
    first: ChangeEvent,
    inbox: &mut mpsc::Receiver<ChangeEvent>,
    window: std::time::Duration,
    visible: &VisibleId,
    pending: &mut Vec<String>,
    ctx: &Ctx<Vec<String>>,
) -> Result<(), WatchError> {
    let Some(burst) = coalesce::collect(first, inbox, window, &ctx.kill).await else {
        return Err(WatchError::Cancelled);
    };
    for (stored, exists) in burst {
        let Some(name) = visible(&stored) else {
            warn!(id = %stored, "unrecognized id in change event");
            continue;
        };
        if exists {
            if !pending.contains(&name) {
                pending.push(name);
            }
        } else {
            pending.retain(|p| p != &name);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "strings_tests.rs"]
mod tests;
