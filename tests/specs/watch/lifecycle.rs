// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Create-then-destroy lifecycle observation.

use crate::prelude::*;
use lookout_core::Life;
use lookout_store::collections;
use lookout_watch::Watcher;

#[tokio::test]
async fn application_create_then_destroy_emits_exactly_twice() {
    let (store, state) = fixture();
    let mut watcher = state.watch_applications();
    assert!(next(watcher.changes()).await.is_empty());

    store.add_application("wordpress", Life::Alive);
    assert_eq!(next(watcher.changes()).await, vec!["wordpress"]);

    store.remove(collections::APPLICATIONS, "wordpress");
    assert_eq!(next(watcher.changes()).await, vec!["wordpress"]);

    expect_quiet(watcher.changes()).await;
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn unit_lifecycle_flows_through_the_application_unit_watcher() {
    let (store, state) = fixture();
    store.add_unit("wordpress/0", Life::Alive);
    store.add_unit("wordpress/1", Life::Alive);
    settle().await;

    let mut watcher = state.watch_application_units("wordpress");
    let mut initial = next(watcher.changes()).await;
    initial.sort();
    assert_eq!(initial, vec!["wordpress/0", "wordpress/1"]);

    store.set_life(collections::UNITS, "wordpress/1", Life::Dying);
    assert_eq!(next(watcher.changes()).await, vec!["wordpress/1"]);

    store.set_life(collections::UNITS, "wordpress/1", Life::Dead);
    assert_eq!(next(watcher.changes()).await, vec!["wordpress/1"]);

    // Dead was reported; removal of the document adds nothing.
    store.remove(collections::UNITS, "wordpress/1");
    expect_quiet(watcher.changes()).await;
    watcher.stop().await.unwrap();
}
