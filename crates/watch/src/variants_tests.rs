// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::testkit::{expect_quiet, fixture, next, settle};
use crate::watcher::Watcher;

#[tokio::test]
async fn status_watcher_projects_the_document() {
    let (store, state) = fixture();
    store.set_status("u#wordpress/0", "blocked", "waiting for db", Some(1_700));
    settle().await;

    let mut watcher = state.watch_status("u#wordpress/0");
    let info = next(watcher.changes()).await;
    assert_eq!(info.status, "blocked");
    assert_eq!(info.message, "waiting for db");
    assert_eq!(info.since, Some(1_700));

    store.set_status("u#wordpress/0", "active", "", None);
    let info = next(watcher.changes()).await;
    assert_eq!(info.status, "active");
    assert!(info.message.is_empty());
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn status_watcher_is_silent_until_a_status_exists() {
    let (store, state) = fixture();
    let mut watcher = state.watch_status("u#wordpress/0");
    expect_quiet(watcher.changes()).await;

    store.set_status("u#wordpress/0", "active", "", None);
    assert_eq!(next(watcher.changes()).await.status, "active");
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn reboot_watcher_ticks_on_request_and_clear() {
    let (store, state) = fixture();
    let mut watcher = state.watch_reboot("0");
    expect_quiet(watcher.changes()).await;

    store.request_reboot("0");
    next(watcher.changes()).await;

    store.clear_reboot("0");
    next(watcher.changes()).await;
    watcher.stop().await.unwrap();
}
