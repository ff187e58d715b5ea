// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::WatchError;
use crate::testkit::{expect_closed, expect_quiet, fixture, next, settle};
use crate::watcher::Watcher;
use lookout_core::Settings;
use lookout_store::{collections, StoreError};

#[tokio::test]
async fn existing_document_does_not_tick_at_startup() {
    let (store, state) = fixture();
    store.write_settings("cfg", Settings::new());
    settle().await;

    let mut watcher = state.watch_entity(collections::SETTINGS, "cfg");
    expect_quiet(watcher.changes()).await;

    store.write_settings("cfg", Settings::new());
    next(watcher.changes()).await;
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn burst_of_writes_produces_one_tick() {
    let (store, state) = fixture();
    store.write_settings("cfg", Settings::new());
    settle().await;

    let mut watcher = state.watch_entity(collections::SETTINGS, "cfg");
    expect_quiet(watcher.changes()).await;

    for value in ["x", "y", "z"] {
        let mut content = Settings::new();
        content.insert("value".into(), serde_json::json!(value));
        store.write_settings("cfg", content);
    }
    next(watcher.changes()).await;
    expect_quiet(watcher.changes()).await;
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn document_created_after_watching_ticks() {
    let (store, state) = fixture();
    let mut watcher = state.watch_entity(collections::SETTINGS, "cfg");
    expect_quiet(watcher.changes()).await;

    store.write_settings("cfg", Settings::new());
    next(watcher.changes()).await;
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn removal_ticks() {
    let (store, state) = fixture();
    store.write_settings("cfg", Settings::new());
    settle().await;

    let mut watcher = state.watch_entity(collections::SETTINGS, "cfg");
    settle().await;
    store.remove_settings("cfg");
    next(watcher.changes()).await;
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn kill_closes_the_channel_with_the_cancelled_sentinel() {
    let (store, state) = fixture();
    store.write_settings("cfg", Settings::new());
    let mut watcher = state.watch_entity(collections::SETTINGS, "cfg");

    watcher.kill();
    expect_closed(watcher.changes()).await;
    assert_eq!(watcher.err(), Some(WatchError::Cancelled));
    assert_eq!(watcher.wait().await, Ok(()));
}

#[tokio::test]
async fn hub_failure_propagates_as_terminal_error() {
    let (store, state) = fixture();
    store.write_settings("cfg", Settings::new());
    let mut watcher = state.watch_entity(collections::SETTINGS, "cfg");
    expect_quiet(watcher.changes()).await;

    let cause = StoreError::Io("oplog tailer died".into());
    store.fail(cause.clone());

    expect_closed(watcher.changes()).await;
    assert_eq!(watcher.err(), Some(WatchError::Hub(cause)));
}
