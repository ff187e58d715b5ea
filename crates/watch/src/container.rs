// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine units watcher.
//!
//! Tracks the units assigned to one machine, transitively including
//! their subordinates. The machine document's revision watch announces
//! newly assigned principals; each tracked unit carries its own revision
//! watch, and a refresh that finds the unit detached, dead, or gone
//! removes it along with its subordinates. The first event lists every
//! currently attached unit regardless of lifecycle; later events list
//! the units whose attachment or lifecycle changed.

use crate::env;
use crate::error::WatchError;
use crate::hub::{Hub, SubHandle};
use crate::watcher::{impl_watcher, Core, Ctx};
use lookout_core::{global_id, local_id, Life};
use lookout_store::{collections, ChangeEvent, StateStore};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Strings watcher over one machine's units and their subordinates.
pub struct MachineUnitsWatcher {
    core: Core<Vec<String>>,
}

impl_watcher!(MachineUnitsWatcher, Vec<String>);

pub(crate) struct MachineUnitsParams<S> {
    pub hub: Hub,
    pub store: Arc<S>,
    pub model: String,
    /// Local machine id.
    pub machine: String,
}

impl MachineUnitsWatcher {
    pub(crate) fn spawn<S: StateStore>(params: MachineUnitsParams<S>) -> Self {
        Self { core: Core::spawn(move |ctx| run(params, ctx)) }
    }
}

struct Tracker<S> {
    hub: Hub,
    store: Arc<S>,
    model: String,
    machine: String,
    updates_tx: mpsc::Sender<ChangeEvent>,
    /// Last reported lifecycle of every tracked unit.
    known: HashMap<String, Life>,
    watched: HashMap<String, SubHandle>,
    /// Tracked subordinates per tracked unit, for cascading removal.
    subordinates: HashMap<String, Vec<String>>,
    pending: Vec<String>,
}

impl<S: StateStore> Tracker<S> {
    fn note(&mut self, unit: &str) {
        if !self.pending.iter().any(|p| p == unit) {
            self.pending.push(unit.to_string());
        }
    }

    /// Start tracking `unit` and, transitively, its subordinates. Units
    /// already tracked and units gone by the time we look are skipped.
    async fn track(&mut self, unit: &str) -> Result<(), WatchError> {
        let mut queue = VecDeque::from([unit.to_string()]);
        while let Some(unit) = queue.pop_front() {
            if self.known.contains_key(&unit) {
                continue;
            }
            let stored = global_id(&self.model, &unit);
            let Some(att) = self.store.unit_attachment(&stored).await? else {
                continue;
            };
            let handle = self
                .hub
                .watch_doc(collections::UNITS, &stored, att.revision, self.updates_tx.clone())
                .await?;
            self.known.insert(unit.clone(), att.life);
            self.watched.insert(unit.clone(), handle);
            self.subordinates.insert(unit.clone(), att.subordinates.clone());
            self.note(&unit);
            queue.extend(att.subordinates);
        }
        Ok(())
    }

    /// Stop tracking `unit` and everything subordinate to it. Units last
    /// known dead were already reported as such and are not re-reported.
    fn untrack(&mut self, unit: &str) {
        let mut queue = VecDeque::from([unit.to_string()]);
        while let Some(unit) = queue.pop_front() {
            let Some(last) = self.known.remove(&unit) else {
                continue;
            };
            if let Some(handle) = self.watched.remove(&unit) {
                self.hub.unwatch(handle);
            }
            if !last.is_terminal() {
                self.note(&unit);
            }
            queue.extend(self.subordinates.remove(&unit).unwrap_or_default());
        }
    }

    /// The machine document changed: pick up newly assigned principals.
    /// Units leaving the machine are noticed via their own documents.
    async fn refresh_machine(&mut self) -> Result<(), WatchError> {
        let stored = global_id(&self.model, &self.machine);
        let Some(doc) = self.store.machine_units(&stored).await? else {
            return Err(WatchError::NotFound(self.machine.clone()));
        };
        for unit in doc.units {
            self.track(&unit).await?;
        }
        Ok(())
    }

    /// A tracked unit's document changed: refresh its attachment and
    /// lifecycle.
    async fn refresh_unit(&mut self, unit: &str) -> Result<(), WatchError> {
        let Some(last) = self.known.get(unit).copied() else {
            // Tail event from a subscription dropped moments ago.
            return Ok(());
        };
        let stored = global_id(&self.model, unit);
        let att = self.store.unit_attachment(&stored).await?;
        let attached = att
            .as_ref()
            .map(|a| a.machine.as_deref() == Some(self.machine.as_str()) && !a.life.is_terminal())
            .unwrap_or(false);
        let Some(att) = att.filter(|_| attached) else {
            self.untrack(unit);
            return Ok(());
        };
        if att.life != last {
            self.known.insert(unit.to_string(), att.life);
            self.note(unit);
        }
        // Newly deployed subordinates ride on the principal's change.
        self.subordinates.insert(unit.to_string(), att.subordinates.clone());
        for subordinate in att.subordinates {
            self.track(&subordinate).await?;
        }
        Ok(())
    }
}

async fn run<S: StateStore>(
    params: MachineUnitsParams<S>,
    ctx: Ctx<Vec<String>>,
) -> Result<(), WatchError> {
    let MachineUnitsParams { hub, store, model, machine } = params;
    let dead = hub.dead();
    let (updates_tx, mut updates) = mpsc::channel(env::sink_buffer());

    let stored_machine = global_id(&model, &machine);
    let Some(doc) = store.machine_units(&stored_machine).await? else {
        return Err(WatchError::NotFound(machine));
    };
    let machine_sub = hub
        .watch_doc(collections::MACHINES, &stored_machine, doc.revision, updates_tx.clone())
        .await?;

    let mut tracker = Tracker {
        hub: hub.clone(),
        store,
        model,
        machine,
        updates_tx,
        known: HashMap::new(),
        watched: HashMap::new(),
        subordinates: HashMap::new(),
        pending: Vec::new(),
    };

    let result = async {
        for unit in doc.units {
            tracker.track(&unit).await?;
        }

        let mut initial_due = true;
        loop {
            if initial_due || !tracker.pending.is_empty() {
                tokio::select! {
                    _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                    _ = dead.cancelled() => return Err(hub.death_error()),
                    maybe = updates.recv() => match maybe {
                        Some(ev) => changed(&mut tracker, ev).await?,
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
                    maybe = updates.recv() => match maybe {
                        Some(ev) => changed(&mut tracker, ev).await?,
                        None => return Err(hub.death_error()),
                    },
                }
            }
        }
    }
    .await;

    hub.unwatch(machine_sub);
    for (_, handle) in tracker.watched.drain() {
        hub.unwatch(handle);
    }
    result
}

async fn changed<S: StateStore>(tracker: &mut Tracker<S>, ev: ChangeEvent) -> Result<(), WatchError> {
    match ev.collection.as_str() {
        collections::MACHINES => tracker.refresh_machine().await,
        collections::UNITS => {
            let model = tracker.model.clone();
            let Some(local) = local_id(&model, &ev.id) else {
                warn!(id = %ev.id, "unit event for id outside model");
                return Ok(());
            };
            tracker.refresh_unit(local).await
        }
        other => {
            warn!(collection = %other, id = %ev.id, "unexpected collection in machine watch");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
