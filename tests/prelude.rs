// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the watcher specs.

use lookout_store::MemStore;
use lookout_watch::{Hub, State};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Store, hub, and state facade over one model.
pub fn fixture() -> (Arc<MemStore>, State<MemStore>) {
    let (store, stream) = MemStore::new("spec-model");
    let hub = Hub::spawn(stream);
    let state = State::new(hub, Arc::clone(&store), store.model().to_string());
    (store, state)
}

/// Receive the next event, failing the test if none arrives in time.
pub async fn next<T>(rx: &mut mpsc::Receiver<T>) -> T {
    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(event)) => event,
        Ok(None) => panic!("watcher channel closed while an event was expected"),
        Err(_) => panic!("timed out waiting for a watcher event"),
    }
}

/// Assert the channel closes, failing the test if it stays open.
pub async fn expect_closed<T>(rx: &mut mpsc::Receiver<T>) {
    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(None) => {}
        Ok(Some(_)) => panic!("unexpected event on a channel expected to close"),
        Err(_) => panic!("timed out waiting for the watcher channel to close"),
    }
}

/// Assert no event is delivered within a few coalesce windows.
pub async fn expect_quiet<T: std::fmt::Debug>(rx: &mut mpsc::Receiver<T>) {
    tokio::time::sleep(Duration::from_millis(80)).await;
    if let Ok(event) = rx.try_recv() {
        panic!("expected no event, got {event:?}");
    }
}

/// Let the hub and watchers drain pending work past the coalesce window.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}
