// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The change hub: the process-wide multiplexer over the store's change
//! log.
//!
//! The hub owns the single connection to the change log. Watchers
//! register sinks for one document, for a whole collection, or for a
//! collection filtered by a pure predicate; the hub delivers raw events
//! to every matching sink in commit order. Subscription state lives in an
//! arena of sinks addressed by index-plus-generation handles, so a stale
//! handle can never reach a recycled slot.
//!
//! Delivery never blocks the pump: each sink has a small buffer, and when
//! a subscriber falls behind the hub coalesces redundant events for the
//! same document into the latest revision in a per-sink pending queue. A
//! transition into revision `-1` (document removed) is never collapsed
//! away.
//!
//! The hub is singular and fatal: the first change-log error kills it,
//! the death token fires, and every watcher translates that into its own
//! terminal error.

use crate::env;
use crate::error::WatchError;
use lookout_store::{ChangeEvent, ChangeStream, IdFilter, StoreError, REV_ABSENT};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Handle to one subscription; index plus generation into the sink arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubHandle {
    index: usize,
    generation: u64,
}

/// Clonable handle to the hub task.
#[derive(Clone)]
pub struct Hub {
    ctl: mpsc::UnboundedSender<Ctl>,
    dead: CancellationToken,
    cause: Arc<Mutex<Option<StoreError>>>,
}

impl Hub {
    /// Spawn the hub task over the store's change stream.
    pub fn spawn(stream: ChangeStream) -> Self {
        let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
        let dead = CancellationToken::new();
        let cause = Arc::new(Mutex::new(None));
        let pump = Pump {
            stream,
            ctl: ctl_rx,
            arena: Arena::default(),
            by_doc: HashMap::new(),
            by_coll: HashMap::new(),
            revisions: HashMap::new(),
            dead: dead.clone(),
            cause: Arc::clone(&cause),
        };
        tokio::spawn(pump.run());
        Self { ctl: ctl_tx, dead, cause }
    }

    /// Subscribe to one document. Events with a revision at or below
    /// `base_revision` are suppressed; if the hub already knows a newer
    /// revision, one priming event is delivered immediately.
    pub async fn watch_doc(
        &self,
        collection: &str,
        id: &str,
        base_revision: i64,
        sink: mpsc::Sender<ChangeEvent>,
    ) -> Result<SubHandle, WatchError> {
        self.subscribe(Ctl::watch_doc(collection, id, base_revision, sink)).await
    }

    /// Subscribe to every change in a collection.
    pub async fn watch_collection(
        &self,
        collection: &str,
        sink: mpsc::Sender<ChangeEvent>,
    ) -> Result<SubHandle, WatchError> {
        self.subscribe(Ctl::watch_collection(collection, sink, None)).await
    }

    /// Subscribe to changes in a collection whose ids satisfy `filter`.
    /// The predicate runs on the hub task and must be cheap.
    pub async fn watch_collection_filtered(
        &self,
        collection: &str,
        sink: mpsc::Sender<ChangeEvent>,
        filter: IdFilter,
    ) -> Result<SubHandle, WatchError> {
        self.subscribe(Ctl::watch_collection(collection, sink, Some(filter))).await
    }

    /// Drop a subscription. Safe to call with a stale handle.
    pub fn unwatch(&self, handle: SubHandle) {
        let _ = self.ctl.send(Ctl::Unwatch { handle });
    }

    /// Token cancelled when the hub dies.
    pub fn dead(&self) -> CancellationToken {
        self.dead.clone()
    }

    /// Terminal cause, once dead. `None` means a clean close.
    pub fn err(&self) -> Option<StoreError> {
        self.cause.lock().clone()
    }

    /// The error a watcher should die with when it observes hub death.
    /// Never silent: a clean close maps to the store-closed sentinel.
    pub(crate) fn death_error(&self) -> WatchError {
        match self.err() {
            Some(cause) => WatchError::Hub(cause),
            None => WatchError::StoreClosed,
        }
    }

    async fn subscribe(&self, (ctl, reply): (Ctl, ReplyRx)) -> Result<SubHandle, WatchError> {
        self.ctl.send(ctl).map_err(|_| self.death_error())?;
        reply.await.map_err(|_| self.death_error())
    }
}

type ReplyRx = oneshot::Receiver<SubHandle>;

enum Ctl {
    Watch { sub: Sub, reply: oneshot::Sender<SubHandle> },
    Unwatch { handle: SubHandle },
}

impl Ctl {
    fn watch_doc(
        collection: &str,
        id: &str,
        base_revision: i64,
        sink: mpsc::Sender<ChangeEvent>,
    ) -> (Self, ReplyRx) {
        let (reply, rx) = oneshot::channel();
        let sub = Sub {
            kind: SubKind::Doc {
                collection: collection.to_string(),
                id: id.to_string(),
                base_revision,
            },
            sink,
            pending: VecDeque::new(),
        };
        (Self::Watch { sub, reply }, rx)
    }

    fn watch_collection(
        collection: &str,
        sink: mpsc::Sender<ChangeEvent>,
        filter: Option<IdFilter>,
    ) -> (Self, ReplyRx) {
        let (reply, rx) = oneshot::channel();
        let sub = Sub {
            kind: SubKind::Collection { collection: collection.to_string(), filter },
            sink,
            pending: VecDeque::new(),
        };
        (Self::Watch { sub, reply }, rx)
    }
}

enum SubKind {
    Doc { collection: String, id: String, base_revision: i64 },
    Collection { collection: String, filter: Option<IdFilter> },
}

struct Sub {
    kind: SubKind,
    sink: mpsc::Sender<ChangeEvent>,
    /// Coalesced backlog used while the sink is full; drained in order
    /// before any fresh delivery.
    pending: VecDeque<ChangeEvent>,
}

impl Sub {
    /// Whether an event for the subscribed document should be delivered
    /// given the base revision supplied at subscription time.
    fn wants(base_revision: i64, revision: i64) -> bool {
        revision > base_revision || (revision == REV_ABSENT && base_revision != REV_ABSENT)
    }

    /// Deliver or enqueue one event. Returns false when the sink is gone.
    fn deliver(&mut self, ev: &ChangeEvent) -> bool {
        if !self.pending.is_empty() {
            push_pending(&mut self.pending, ev.clone());
            return true;
        }
        match self.sink.try_send(ev.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                push_pending(&mut self.pending, ev);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Drain as much of the pending queue as the sink accepts. Returns
    /// false when the sink is gone.
    fn flush(&mut self) -> bool {
        while let Some(ev) = self.pending.pop_front() {
            match self.sink.try_send(ev) {
                Ok(()) => continue,
                Err(TrySendError::Full(ev)) => {
                    self.pending.push_front(ev);
                    break;
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }
        true
    }
}

/// Merge an event into a pending queue: redundant events for the same
/// document collapse to the latest revision, but a recorded removal is
/// kept when the document reappears.
fn push_pending(pending: &mut VecDeque<ChangeEvent>, ev: ChangeEvent) {
    let Some(pos) = pending
        .iter()
        .rposition(|p| p.collection == ev.collection && p.id == ev.id)
    else {
        pending.push_back(ev);
        return;
    };
    if pending[pos].revision == ev.revision {
        return;
    }
    if pending[pos].revision == REV_ABSENT {
        // Keep the recorded removal; the re-creation follows it.
        pending.push_back(ev);
        return;
    }
    let earlier_removal = pending
        .iter()
        .take(pos)
        .any(|p| p.collection == ev.collection && p.id == ev.id && p.revision == REV_ABSENT);
    if ev.revision == REV_ABSENT && earlier_removal {
        // The re-creation un-happened; the earlier removal still stands.
        pending.remove(pos);
    } else {
        pending[pos].revision = ev.revision;
    }
}

struct Pump {
    stream: ChangeStream,
    ctl: mpsc::UnboundedReceiver<Ctl>,
    arena: Arena,
    by_doc: HashMap<(String, String), Vec<usize>>,
    by_coll: HashMap<String, Vec<usize>>,
    /// Latest revision seen per document, used to prime late subscribers.
    revisions: HashMap<(String, String), i64>,
    dead: CancellationToken,
    cause: Arc<Mutex<Option<StoreError>>>,
}

impl Pump {
    async fn run(mut self) {
        let mut flush = tokio::time::interval(env::coalesce_window());
        flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                item = self.stream.recv() => match item {
                    Some(Ok(ev)) => self.dispatch(ev),
                    Some(Err(err)) => return self.shutdown(Some(err)),
                    None => return self.shutdown(None),
                },
                Some(ctl) = self.ctl.recv() => self.control(ctl),
                _ = flush.tick() => self.flush_all(),
            }
        }
    }

    fn control(&mut self, ctl: Ctl) {
        match ctl {
            Ctl::Watch { sub, reply } => {
                let handle = self.attach(sub);
                if reply.send(handle).is_err() {
                    // Subscriber gave up before the handle arrived.
                    self.detach(handle);
                }
            }
            Ctl::Unwatch { handle } => self.detach(handle),
        }
    }

    fn attach(&mut self, sub: Sub) -> SubHandle {
        enum Route {
            Doc { key: (String, String), base: i64 },
            Collection { collection: String },
        }
        let route = match &sub.kind {
            SubKind::Doc { collection, id, base_revision } => Route::Doc {
                key: (collection.clone(), id.clone()),
                base: *base_revision,
            },
            SubKind::Collection { collection, .. } => {
                Route::Collection { collection: collection.clone() }
            }
        };
        let handle = self.arena.insert(sub);
        match route {
            Route::Doc { key, base } => {
                debug!(collection = %key.0, id = %key.1, base, "watch doc");
                self.by_doc.entry(key.clone()).or_default().push(handle.index);
                // Prime the pump: the subscriber may already be behind.
                if let Some(&known) = self.revisions.get(&key) {
                    if Sub::wants(base, known) {
                        let ev = ChangeEvent::new(key.0, key.1, known);
                        self.deliver_to(handle.index, &ev);
                    }
                }
            }
            Route::Collection { collection } => {
                debug!(%collection, "watch collection");
                self.by_coll.entry(collection).or_default().push(handle.index);
            }
        }
        handle
    }

    fn detach(&mut self, handle: SubHandle) {
        if let Some(sub) = self.arena.remove(handle) {
            self.unindex(handle.index, &sub.kind);
        }
    }

    fn unindex(&mut self, index: usize, kind: &SubKind) {
        match kind {
            SubKind::Doc { collection, id, .. } => {
                let key = (collection.clone(), id.clone());
                if let Some(indices) = self.by_doc.get_mut(&key) {
                    indices.retain(|&i| i != index);
                    if indices.is_empty() {
                        self.by_doc.remove(&key);
                    }
                }
            }
            SubKind::Collection { collection, .. } => {
                if let Some(indices) = self.by_coll.get_mut(collection) {
                    indices.retain(|&i| i != index);
                    if indices.is_empty() {
                        self.by_coll.remove(collection);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, ev: ChangeEvent) {
        let key = (ev.collection.clone(), ev.id.clone());
        self.revisions.insert(key.clone(), ev.revision);

        let mut targets = Vec::new();
        if let Some(indices) = self.by_doc.get(&key) {
            targets.extend_from_slice(indices);
        }
        if let Some(indices) = self.by_coll.get(&ev.collection) {
            targets.extend_from_slice(indices);
        }
        for index in targets {
            self.deliver_to(index, &ev);
        }
    }

    fn deliver_to(&mut self, index: usize, ev: &ChangeEvent) {
        let Some(sub) = self.arena.get_index_mut(index) else {
            return;
        };
        let wanted = match &sub.kind {
            SubKind::Doc { base_revision, .. } => Sub::wants(*base_revision, ev.revision),
            SubKind::Collection { filter, .. } => {
                filter.as_ref().map(|f| f(&ev.id)).unwrap_or(true)
            }
        };
        if wanted && !sub.deliver(ev) {
            self.remove_index(index);
        }
    }

    fn flush_all(&mut self) {
        let stale: Vec<usize> = self
            .arena
            .indices_with_pending()
            .into_iter()
            .filter(|&index| {
                self.arena.get_index_mut(index).map(|sub| !sub.flush()).unwrap_or(false)
            })
            .collect();
        for index in stale {
            self.remove_index(index);
        }
    }

    fn remove_index(&mut self, index: usize) {
        if let Some(sub) = self.arena.remove_index(index) {
            self.unindex(index, &sub.kind);
        }
    }

    fn shutdown(self, cause: Option<StoreError>) {
        match &cause {
            Some(err) => error!(%err, "change stream failed"),
            None => debug!("change stream closed"),
        }
        // Record the cause before firing the token so observers of the
        // token always see it.
        *self.cause.lock() = cause;
        self.dead.cancel();
    }
}

/// Arena of sinks: slots recycled through a free list, each carrying a
/// generation that invalidates stale handles.
#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

struct Slot {
    generation: u64,
    sub: Option<Sub>,
}

impl Arena {
    fn insert(&mut self, sub: Sub) -> SubHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.generation += 1;
                slot.sub = Some(sub);
                SubHandle { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, sub: Some(sub) });
                SubHandle { index: self.slots.len() - 1, generation: 0 }
            }
        }
    }

    fn get_index_mut(&mut self, index: usize) -> Option<&mut Sub> {
        self.slots.get_mut(index).and_then(|slot| slot.sub.as_mut())
    }

    fn remove(&mut self, handle: SubHandle) -> Option<Sub> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let sub = slot.sub.take();
        if sub.is_some() {
            self.free.push(handle.index);
        }
        sub
    }

    fn remove_index(&mut self, index: usize) -> Option<Sub> {
        let slot = self.slots.get_mut(index)?;
        let sub = slot.sub.take();
        if sub.is_some() {
            self.free.push(index);
        }
        sub
    }

    fn indices_with_pending(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.sub.as_ref().map(|sub| !sub.pending.is_empty()).unwrap_or(false)
            })
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
