// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings version observation through the relation-units watcher.

use crate::prelude::*;
use lookout_core::Settings;
use lookout_store::MemStore;
use lookout_watch::Watcher;

const REL: &str = "r#0#db";

fn join(store: &MemStore, unit: &str, address: &str) -> i64 {
    let mut content = Settings::new();
    content.insert("private-address".into(), serde_json::json!(address));
    let version = store.write_settings(&format!("{REL}#{unit}"), content);
    store.enter_scope(REL, unit);
    version
}

#[tokio::test]
async fn counterpart_versions_rise_monotonically() {
    let (store, state) = fixture();
    let mut watcher = state.watch_relation_units(REL, "wordpress/0");
    next(watcher.changes()).await;

    let v0 = join(&store, "mysql/0", "10.0.0.1");
    let event = next(watcher.changes()).await;
    assert_eq!(event.changed["mysql/0"].version, v0);

    let mut content = Settings::new();
    content.insert("private-address".into(), serde_json::json!("10.0.0.9"));
    let v1 = store.write_settings(&format!("{REL}#mysql/0"), content);
    assert!(v1 > v0);

    let event = next(watcher.changes()).await;
    assert_eq!(event.changed["mysql/0"].version, v1);
    for unit in event.changed.keys() {
        assert!(!event.departed.contains(unit));
    }
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn the_observer_is_excluded_from_relation_units() {
    let (store, state) = fixture();
    let mut watcher = state.watch_relation_units(REL, "wordpress/0");
    next(watcher.changes()).await;

    join(&store, "wordpress/0", "10.0.0.2");
    expect_quiet(watcher.changes()).await;
    watcher.stop().await.unwrap();
}
