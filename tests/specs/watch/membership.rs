// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relation scope membership scenarios.

use crate::prelude::*;
use lookout_watch::Watcher;

const REL: &str = "r#0#db";

#[tokio::test]
async fn members_enter_and_depart_one_diff_at_a_time() {
    let (store, state) = fixture();
    let mut watcher = state.watch_relation_scope(REL, "mysql/0");
    assert!(next(watcher.changes()).await.is_empty());

    store.enter_scope(REL, "wordpress/0");
    let event = next(watcher.changes()).await;
    assert_eq!(event.entered, vec!["wordpress/0"]);
    assert!(event.left.is_empty());

    store.enter_scope(REL, "wordpress/1");
    let event = next(watcher.changes()).await;
    assert_eq!(event.entered, vec!["wordpress/1"]);
    assert!(event.left.is_empty());

    store.depart_scope(REL, "wordpress/0");
    let event = next(watcher.changes()).await;
    assert!(event.entered.is_empty());
    assert_eq!(event.left, vec!["wordpress/0"]);
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn entered_and_left_stay_disjoint_under_churn() {
    let (store, state) = fixture();
    store.enter_scope(REL, "wordpress/0");
    settle().await;

    let mut watcher = state.watch_relation_scope(REL, "mysql/0");
    next(watcher.changes()).await;

    // Churn while the caller is away; every event stays internally
    // consistent.
    store.depart_scope(REL, "wordpress/0");
    store.enter_scope(REL, "wordpress/1");
    settle().await;
    store.enter_scope(REL, "wordpress/2");
    settle().await;

    for _ in 0..2 {
        let event = next(watcher.changes()).await;
        for name in &event.entered {
            assert!(!event.left.contains(name));
        }
    }
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn the_observer_never_sees_itself() {
    let (store, state) = fixture();
    let mut watcher = state.watch_relation_scope(REL, "wordpress/0");
    assert!(next(watcher.changes()).await.is_empty());

    store.enter_scope(REL, "wordpress/0");
    store.depart_scope(REL, "wordpress/0");
    store.enter_scope(REL, "wordpress/0");
    expect_quiet(watcher.changes()).await;
    watcher.stop().await.unwrap();
}
