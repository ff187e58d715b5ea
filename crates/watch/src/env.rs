// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for watcher tuning.

use std::time::Duration;

/// Idle window used to merge bursts of raw change events
/// (`LOOKOUT_COALESCE_MS`, default 10ms).
pub fn coalesce_window() -> Duration {
    std::env::var("LOOKOUT_COALESCE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(10))
}

/// Capacity of each subscription inbox registered with the hub
/// (`LOOKOUT_SINK_BUFFER`, default 16). The hub falls back to its
/// per-sink pending queue when an inbox fills up.
pub fn sink_buffer() -> usize {
    std::env::var("LOOKOUT_SINK_BUFFER")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(16)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
