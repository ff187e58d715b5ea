// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lookout-watch: the watcher framework.
//!
//! A single change hub reads the store's change log and demultiplexes raw
//! `{collection, id, revision}` events to subscribed watchers. Each
//! watcher runs one background task that coalesces bursts, maintains its
//! own view of the watched state, and emits typed deltas on an output
//! channel the caller consumes. Callers observe termination as a closed
//! channel and read the terminal error afterwards.

pub mod coalesce;
pub mod container;
pub mod env;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod notify;
pub mod relation_units;
pub mod scope;
pub mod settings;
pub mod state;
pub mod strings;
pub mod variants;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testkit;

pub use container::MachineUnitsWatcher;
pub use error::WatchError;
pub use hub::{Hub, SubHandle};
pub use lifecycle::LifecycleWatcher;
pub use notify::EntityWatcher;
pub use relation_units::RelationUnitsWatcher;
pub use scope::ScopeWatcher;
pub use settings::SettingsWatcher;
pub use state::State;
pub use strings::FilterWatcher;
pub use variants::StatusWatcher;
pub use watcher::Watcher;
