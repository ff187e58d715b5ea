// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn events_flow_then_channel_closes_with_error_recorded() {
    let mut core: Core<u32> = Core::spawn(|ctx| async move {
        for n in 1..=3u32 {
            if ctx.out.send(n).await.is_err() {
                return Err(WatchError::Cancelled);
            }
        }
        Err(WatchError::StoreClosed)
    });

    assert_eq!(core.changes().recv().await, Some(1));
    assert_eq!(core.changes().recv().await, Some(2));
    assert_eq!(core.changes().recv().await, Some(3));
    // Channel close follows the task exit; by then the error is set.
    assert_eq!(core.changes().recv().await, None);
    assert_eq!(core.err(), Some(WatchError::StoreClosed));
    assert_eq!(core.wait().await, Err(WatchError::StoreClosed));
}

#[tokio::test]
async fn err_is_none_while_running() {
    let core: Core<()> = Core::spawn(|ctx| async move {
        ctx.kill.cancelled().await;
        Err(WatchError::Cancelled)
    });
    assert_eq!(core.err(), None);
    core.kill();
}

#[tokio::test]
async fn kill_wait_is_clean_and_idempotent() {
    let mut core: Core<()> = Core::spawn(|ctx| async move {
        ctx.kill.cancelled().await;
        Err(WatchError::Cancelled)
    });

    core.kill();
    core.kill();
    assert_eq!(core.wait().await, Ok(()));
    assert_eq!(core.wait().await, Ok(()));
    assert_eq!(core.err(), Some(WatchError::Cancelled));
}

#[tokio::test]
async fn kill_unblocks_a_task_waiting_to_send() {
    // The caller never reads, so the task parks on the output send; the
    // kill must still take effect promptly.
    let mut core: Core<u32> = Core::spawn(|ctx| async move {
        let mut n = 0u32;
        loop {
            tokio::select! {
                _ = ctx.kill.cancelled() => return Err(WatchError::Cancelled),
                result = ctx.out.send(n) => match result {
                    Ok(()) => n += 1,
                    Err(_) => return Err(WatchError::Cancelled),
                },
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    core.kill();
    let waited = tokio::time::timeout(Duration::from_secs(1), core.wait())
        .await
        .expect("wait did not return promptly after kill");
    assert_eq!(waited, Ok(()));
    // Any event pending at kill time was simply discarded.
    assert_eq!(core.err(), Some(WatchError::Cancelled));
}

#[tokio::test]
async fn clean_run_exit_counts_as_cancelled() {
    let mut core: Core<()> = Core::spawn(|_ctx| async move { Ok(()) });
    assert_eq!(core.wait().await, Ok(()));
    assert_eq!(core.err(), Some(WatchError::Cancelled));
}
