// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-document notify watcher.
//!
//! Watches one document and emits a contentless tick whenever its
//! revision changes. The watcher primes itself with the document's
//! current revision, so creation does not produce a spurious tick; a
//! burst of writes within the coalesce window produces one tick.

use crate::coalesce;
use crate::env;
use crate::error::WatchError;
use crate::hub::Hub;
use crate::watcher::{impl_watcher, Core, Ctx};
use lookout_store::{ChangeEvent, StateStore, REV_ABSENT};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Notify watcher over one document.
pub struct EntityWatcher {
    core: Core<()>,
}

impl_watcher!(EntityWatcher, ());

pub(crate) struct EntityParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    pub collection: String,
    /// Stored (model-prefixed) document id.
    pub id: String,
}

impl EntityWatcher {
    pub(crate) fn spawn<S: StateStore>(params: EntityParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

async fn run<S: StateStore>(params: EntityParams<S>, ctx: Ctx<()>) -> Result<(), WatchError> {
    let EntityParams { hub, store, collection, id } = params;
    let dead = hub.dead();
    let (tx, mut inbox) = mpsc::channel(env::sink_buffer());
    let window = env::coalesce_window();

    let base = store.revision_of(&collection, &id).await?.unwrap_or(REV_ABSENT);
    let sub = hub.watch_doc(&collection, &id, base, tx).await?;
    let result = watch(&hub, &dead, &mut inbox, window, &ctx).await;
    hub.unwatch(sub);
    result
}

async fn watch(
    hub: &Hub,
    dead: &tokio_util::sync::CancellationToken,
    inbox: &mut mpsc::Receiver<ChangeEvent>,
    window: std::time::Duration,
    ctx: &Ctx<()>,
) -> Result<(), WatchError> {
    let mut pending = false;
    loop {
        if pending {
            tokio::select! {
                _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                _ = dead.cancelled() => return Err(hub.death_error()),
                maybe = inbox.recv() => match maybe {
                    // Further ticks merge into the one already pending.
                    Some(_) => {}
                    None => return Err(hub.death_error()),
                },
                permit = ctx.out.reserve() => match permit {
                    Ok(permit) => {
                        permit.send(());
                        pending = false;
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
                        if coalesce::collect(first, inbox, window, &ctx.kill).await.is_none() {
                            return Err(WatchError::Cancelled);
                        }
                        pending = true;
                    }
                    None => return Err(hub.death_error()),
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
