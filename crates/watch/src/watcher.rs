// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Common watcher lifecycle.
//!
//! Every watcher owns one background task and one output channel. The
//! task's only blocking operation is a select over its kill token, the
//! hub death token, its subscription inbox, and the output send. [`Core`]
//! carries the shared plumbing: it spawns the task, records the terminal
//! error, and guarantees the output channel closes exactly once, after
//! the error is recorded, so a caller that sees the channel close can
//! immediately read [`Watcher::err`].

use crate::error::WatchError;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Common contract for every watcher.
///
/// Callers range over [`changes`]; when the channel closes they inspect
/// [`err`]: a non-cancelled error means the subscription is lost and the
/// watcher must be re-created to resume observing.
///
/// [`changes`]: Watcher::changes
/// [`err`]: Watcher::err
#[async_trait::async_trait]
pub trait Watcher: Send {
    type Event: Send;

    /// This watcher's event stream. The first received value reflects a
    /// snapshot no older than the watcher's creation; the channel closes
    /// on termination.
    fn changes(&mut self) -> &mut mpsc::Receiver<Self::Event>;

    /// Ask the watcher to stop. Idempotent, non-blocking, callable from
    /// any task.
    fn kill(&self);

    /// Wait for the background task to exit; `Ok` after a clean stop.
    async fn wait(&mut self) -> Result<(), WatchError>;

    /// Kill, then wait.
    async fn stop(&mut self) -> Result<(), WatchError> {
        self.kill();
        self.wait().await
    }

    /// `None` while running; [`WatchError::Cancelled`] after a clean
    /// stop; the real cause after a failure.
    fn err(&self) -> Option<WatchError>;
}

/// Handles given to a watcher's background task.
pub(crate) struct Ctx<T> {
    /// Output channel; capacity 1 so the task observes the caller's
    /// consumption rate directly.
    pub(crate) out: mpsc::Sender<T>,
    pub(crate) kill: CancellationToken,
}

/// Shared state behind every concrete watcher.
pub(crate) struct Core<T> {
    changes: mpsc::Receiver<T>,
    kill: CancellationToken,
    task: Option<JoinHandle<()>>,
    terminal: Arc<Mutex<Option<WatchError>>>,
}

impl<T: Send + 'static> Core<T> {
    /// Spawn a watcher task. The task runs `run` to completion; a clean
    /// exit or an explicit `Cancelled` both record the cancelled
    /// sentinel.
    pub(crate) fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(Ctx<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), WatchError>> + Send + 'static,
    {
        let (out, changes) = mpsc::channel(1);
        let kill = CancellationToken::new();
        let terminal = Arc::new(Mutex::new(None));

        let ctx = Ctx { out: out.clone(), kill: kill.clone() };
        let slot = Arc::clone(&terminal);
        let task = tokio::spawn(async move {
            let err = match run(ctx).await {
                Ok(()) => WatchError::Cancelled,
                Err(err) => err,
            };
            if !err.is_cancelled() {
                debug!(%err, "watcher failed");
            }
            // Record the terminal error before the last sender drops, so
            // a closed channel always has an error behind it.
            *slot.lock() = Some(err);
            drop(out);
        });

        Self { changes, kill, task: Some(task), terminal }
    }

    pub(crate) fn changes(&mut self) -> &mut mpsc::Receiver<T> {
        &mut self.changes
    }

    pub(crate) fn kill(&self) {
        self.kill.cancel();
    }

    pub(crate) async fn wait(&mut self) -> Result<(), WatchError> {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        match self.err() {
            None | Some(WatchError::Cancelled) => Ok(()),
            Some(err) => Err(err),
        }
    }

    pub(crate) fn err(&self) -> Option<WatchError> {
        self.terminal.lock().clone()
    }
}

/// Implement [`Watcher`] for a struct with a `core: Core<E>` field.
macro_rules! impl_watcher {
    ($watcher:ty, $event:ty) => {
        #[async_trait::async_trait]
        impl $crate::watcher::Watcher for $watcher {
            type Event = $event;

            fn changes(&mut self) -> &mut tokio::sync::mpsc::Receiver<$event> {
                self.core.changes()
            }

            fn kill(&self) {
                self.core.kill()
            }

            async fn wait(&mut self) -> Result<(), $crate::error::WatchError> {
                self.core.wait().await
            }

            fn err(&self) -> Option<$crate::error::WatchError> {
                self.core.err()
            }
        }
    };
}
pub(crate) use impl_watcher;

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
