// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Burst coalescing.
//!
//! Batched transactions commit several raw events back to back; watchers
//! merge each burst into one logical update before touching the store.
//! Starting from the first event of a burst, [`collect`] keeps draining
//! the subscription inbox until it has been idle for the window, then
//! returns the merged view.

use lookout_store::ChangeEvent;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Merge a burst of raw events into `id → exists`.
///
/// The window restarts on every drained event, so a steady trickle keeps
/// extending the burst. Returns `None` when `kill` fires mid-collection;
/// an inbox that closes mid-burst ends the burst (the caller notices the
/// closed inbox on its next receive).
pub(crate) async fn collect(
    first: ChangeEvent,
    inbox: &mut mpsc::Receiver<ChangeEvent>,
    window: Duration,
    kill: &CancellationToken,
) -> Option<HashMap<String, bool>> {
    let mut changes = HashMap::new();
    let exists = first.exists();
    changes.insert(first.id, exists);
    loop {
        tokio::select! {
            _ = kill.cancelled() => return None,
            maybe = inbox.recv() => match maybe {
                Some(ev) => {
                    let exists = ev.exists();
                    changes.insert(ev.id, exists);
                }
                None => break,
            },
            _ = tokio::time::sleep(window) => break,
        }
    }
    Some(changes)
}

#[cfg(test)]
#[path = "coalesce_tests.rs"]
mod tests;
