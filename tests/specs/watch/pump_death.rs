// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A fatal change-stream error reaches every live watcher.

use crate::prelude::*;
use lookout_core::{Life, Settings};
use lookout_store::StoreError;
use lookout_watch::{WatchError, Watcher};

#[tokio::test]
async fn every_live_watcher_fails_with_the_injected_cause() {
    let (store, state) = fixture();
    store.add_application("wordpress", Life::Alive);
    store.add_unit("wordpress/0", Life::Alive);
    store.write_settings("cfg", Settings::new());
    settle().await;

    let mut apps = state.watch_applications();
    let mut units = state.watch_application_units("wordpress");
    let mut cfg = state.watch_settings("cfg");
    let mut scope = state.watch_relation_scope("r#0#db", "wordpress/0");
    next(apps.changes()).await;
    next(units.changes()).await;
    next(cfg.changes()).await;
    next(scope.changes()).await;

    let cause = StoreError::Io("change log tailer lost the connection".into());
    store.fail(cause.clone());

    expect_closed(apps.changes()).await;
    expect_closed(units.changes()).await;
    expect_closed(cfg.changes()).await;
    expect_closed(scope.changes()).await;

    for err in [apps.err(), units.err(), cfg.err(), scope.err()] {
        assert_eq!(err, Some(WatchError::Hub(cause.clone())));
    }
}

#[tokio::test]
async fn a_clean_store_shutdown_surfaces_the_sentinel() {
    let (store, state) = fixture();
    let mut apps = state.watch_applications();
    next(apps.changes()).await;

    store.close();
    expect_closed(apps.changes()).await;
    assert_eq!(apps.err(), Some(WatchError::StoreClosed));
    assert_eq!(apps.wait().await, Err(WatchError::StoreClosed));
}
