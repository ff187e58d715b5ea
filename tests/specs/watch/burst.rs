// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Burst coalescing through the notify and settings watchers.

use crate::prelude::*;
use lookout_core::Settings;
use lookout_store::collections;
use lookout_watch::Watcher;

fn value(v: &str) -> Settings {
    let mut content = Settings::new();
    content.insert("value".into(), serde_json::json!(v));
    content
}

#[tokio::test]
async fn three_writes_in_one_window_tick_once() {
    let (store, state) = fixture();
    store.write_settings("cfg", value("initial"));
    settle().await;

    let mut watcher = state.watch_entity(collections::SETTINGS, "cfg");
    expect_quiet(watcher.changes()).await;

    store.write_settings("cfg", value("x"));
    store.write_settings("cfg", value("y"));
    store.write_settings("cfg", value("z"));

    next(watcher.changes()).await;
    expect_quiet(watcher.changes()).await;
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn settings_watcher_surfaces_only_the_final_burst_content() {
    let (store, state) = fixture();
    store.write_settings("cfg", value("initial"));
    settle().await;

    let mut watcher = state.watch_settings("cfg");
    assert_eq!(next(watcher.changes()).await, value("initial"));

    store.write_settings("cfg", value("x"));
    store.write_settings("cfg", value("y"));
    store.write_settings("cfg", value("z"));

    assert_eq!(next(watcher.changes()).await, value("z"));
    expect_quiet(watcher.changes()).await;
    watcher.stop().await.unwrap();
}
