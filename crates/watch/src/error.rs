// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal errors reported by watchers

use lookout_store::StoreError;
use thiserror::Error;

/// Terminal error of a watcher.
///
/// `Cancelled` is the clean-stop sentinel: it is what [`err`] returns
/// after `kill` + `wait`, and [`wait`] maps it to `Ok(())`. Every other
/// variant is a real failure.
///
/// [`err`]: crate::watcher::Watcher::err
/// [`wait`]: crate::watcher::Watcher::wait
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// The watcher was asked to stop.
    #[error("watcher cancelled")]
    Cancelled,

    /// The change hub died without reporting a cause.
    #[error("change stream closed")]
    StoreClosed,

    /// The change hub died with this cause.
    #[error("change stream failed: {0}")]
    Hub(StoreError),

    /// One of the watcher's own store reads failed.
    #[error("store read failed: {0}")]
    Store(StoreError),

    /// A document this watcher requires was not found.
    #[error("document {0:?} not found")]
    NotFound(String),

    /// A unit entered scope without its settings document; the relation
    /// guarantees settings exist while the unit is in scope.
    #[error("settings missing for {0:?}")]
    SettingsMissing(String),
}

impl WatchError {
    /// Whether this is the clean-stop sentinel rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<StoreError> for WatchError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
