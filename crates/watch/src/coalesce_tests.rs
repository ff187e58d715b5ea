// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lookout_store::REV_ABSENT;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn ev(id: &str, revision: i64) -> ChangeEvent {
    ChangeEvent::new("settings", id, revision)
}

#[tokio::test]
async fn merges_a_burst_keeping_the_latest_existence() {
    let (tx, mut rx) = mpsc::channel(16);
    tx.send(ev("a", 2)).await.unwrap();
    tx.send(ev("b", 1)).await.unwrap();
    tx.send(ev("a", REV_ABSENT)).await.unwrap();

    let first = rx.recv().await.unwrap();
    let kill = CancellationToken::new();
    let merged = collect(first, &mut rx, Duration::from_millis(10), &kill).await.unwrap();

    assert_eq!(merged.len(), 2);
    assert_eq!(merged.get("a"), Some(&false));
    assert_eq!(merged.get("b"), Some(&true));
}

#[tokio::test]
async fn window_closes_an_idle_burst() {
    let (tx, mut rx) = mpsc::channel(16);
    tx.send(ev("a", 1)).await.unwrap();

    let first = rx.recv().await.unwrap();
    let kill = CancellationToken::new();
    let merged = collect(first, &mut rx, Duration::from_millis(10), &kill).await.unwrap();
    assert_eq!(merged.len(), 1);

    // An event after the window belongs to the next burst.
    tx.send(ev("c", 1)).await.unwrap();
    assert!(!merged.contains_key("c"));
    assert_eq!(rx.recv().await.unwrap().id, "c");
}

#[tokio::test]
async fn cancellation_mid_collection_returns_none() {
    let (tx, mut rx) = mpsc::channel::<ChangeEvent>(16);
    let kill = CancellationToken::new();

    let killer = kill.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        killer.cancel();
    });

    // A long window: only the cancellation can end the collection.
    let merged = collect(ev("a", 1), &mut rx, Duration::from_secs(30), &kill).await;
    assert!(merged.is_none());
    drop(tx);
}

#[tokio::test]
async fn closed_inbox_ends_the_burst() {
    let (tx, mut rx) = mpsc::channel(16);
    tx.send(ev("b", 3)).await.unwrap();
    drop(tx);

    let first = rx.recv().await.unwrap();
    let kill = CancellationToken::new();
    let merged = collect(first, &mut rx, Duration::from_secs(30), &kill).await.unwrap();
    assert_eq!(merged.get("b"), Some(&true));
}
