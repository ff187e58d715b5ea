// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings watcher: emits the parsed settings document on each change.
//!
//! If the document does not exist when the watcher is created, nothing
//! is emitted until it first appears; absence after existence is not
//! terminal, the next appearance simply re-emits.

use crate::coalesce;
use crate::env;
use crate::error::WatchError;
use crate::hub::Hub;
use crate::watcher::{impl_watcher, Core, Ctx};
use lookout_core::Settings;
use lookout_store::{collections, ChangeEvent, StateStore, REV_ABSENT};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Watcher emitting parsed settings content.
pub struct SettingsWatcher {
    core: Core<Settings>,
}

impl_watcher!(SettingsWatcher, Settings);

pub(crate) struct SettingsParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    /// Stored (model-prefixed) settings document id.
    pub id: String,
}

impl SettingsWatcher {
    pub(crate) fn spawn<S: StateStore>(params: SettingsParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

async fn run<S: StateStore>(params: SettingsParams<S>, ctx: Ctx<Settings>) -> Result<(), WatchError> {
    let SettingsParams { hub, store, id } = params;
    let dead = hub.dead();
    let window = env::coalesce_window();
    let (tx, mut inbox) = mpsc::channel(env::sink_buffer());

    let initial = store.settings(&id).await?;
    let base = initial.as_ref().map(|doc| doc.revision).unwrap_or(REV_ABSENT);
    let sub = hub.watch_doc(collections::SETTINGS, &id, base, tx).await?;

    let result = async {
        // First event iff the document is observable at creation time.
        let mut pending: Option<Settings> = initial.map(|doc| doc.content);
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
                            (Ok(permit), Some(content)) => permit.send(content),
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
    pending: &mut Option<Settings>,
    ctx: &Ctx<Settings>,
) -> Result<(), WatchError> {
    if coalesce::collect(first, inbox, window, &ctx.kill).await.is_none() {
        return Err(WatchError::Cancelled);
    }
    // Re-read once per burst; an absent document stays silent.
    *pending = store.settings(id).await?.map(|doc| doc.content);
    Ok(())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
