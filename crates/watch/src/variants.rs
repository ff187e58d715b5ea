// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin watcher variants: projections and filters over the base shapes.
//!
//! The status watcher is a settings-shaped projection over the status
//! collection; reboot watching is the notify shape over a machine's
//! reboot-event document; ports watching reuses the filtered strings
//! shape with the opened-ports id transform. The latter two are wired up
//! in [`crate::state::State`].

use crate::coalesce;
use crate::env;
use crate::error::WatchError;
use crate::hub::Hub;
use crate::watcher::{impl_watcher, Core, Ctx};
use lookout_core::StatusInfo;
use lookout_store::{collections, ChangeEvent, StateStore, REV_ABSENT};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Watcher emitting status projections for one status document.
pub struct StatusWatcher {
    core: Core<StatusInfo>,
}

impl_watcher!(StatusWatcher, StatusInfo);

pub(crate) struct StatusParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    /// Stored (model-prefixed) status document id.
    pub id: String,
}

impl StatusWatcher {
    pub(crate) fn spawn<S: StateStore>(params: StatusParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

fn project(doc: lookout_store::StatusDoc) -> StatusInfo {
    StatusInfo { status: doc.status, message: doc.message, since: doc.since }
}

async fn run<S: StateStore>(params: StatusParams<S>, ctx: Ctx<StatusInfo>) -> Result<(), WatchError> {
    let StatusParams { hub, store, id } = params;
    let dead = hub.dead();
    let window = env::coalesce_window();
    let (tx, mut inbox) = mpsc::channel(env::sink_buffer());

    let initial = store.status(&id).await?;
    let base = initial.as_ref().map(|doc| doc.revision).unwrap_or(REV_ABSENT);
    let sub = hub.watch_doc(collections::STATUSES, &id, base, tx).await?;

    let result = async {
        let mut pending: Option<StatusInfo> = initial.map(project);
        loop {
            if pending.is_some() {
                tokio::select! {
                    _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                    _ = dead.cancelled() => return Err(hub.death_error()),
                    maybe = inbox.recv() => match maybe {
                        Some(first) => refresh(first, &mut inbox, window, &store, &id, &mut pending, &ctx).await?,
                        None => return Err(hub.death_error()),
                    },
                    permit = ctx.out.reserve() => {
                        match (permit, pending.take()) {
                            (Ok(permit), Some(info)) => permit.send(info),
                            (Err(_), _) => return Err(WatchError::Cancelled),
                            (Ok(_), None) => {}
                        }
                    }
                }
            } else {
                tokio::select! {
                    _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                    _ = dead.cancelled() => return Err(hub.death_error()),
                    maybe = inbox.recv() => match maybe {
                        Some(first) => refresh(first, &mut inbox, window, &store, &id, &mut pending, &ctx).await?,
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

async fn refresh<S: StateStore>(
    first: ChangeEvent,
    inbox: &mut mpsc::Receiver<ChangeEvent>,
    window: std::time::Duration,
    store: &Arc<S>,
    id: &str,
    pending: &mut Option<StatusInfo>,
    ctx: &Ctx<StatusInfo>,
) -> Result<(), WatchError> {
    if coalesce::collect(first, inbox, window, &ctx.kill).await.is_none() {
        return Err(WatchError::Cancelled);
    }
    *pending = store.status(id).await?.map(project);
    Ok(())
}

#[cfg(test)]
#[path = "variants_tests.rs"]
mod tests;
