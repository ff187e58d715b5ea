// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
#[serial_test::serial]
fn coalesce_window_defaults_and_overrides() {
    std::env::remove_var("LOOKOUT_COALESCE_MS");
    assert_eq!(coalesce_window(), Duration::from_millis(10));

    std::env::set_var("LOOKOUT_COALESCE_MS", "25");
    assert_eq!(coalesce_window(), Duration::from_millis(25));

    std::env::set_var("LOOKOUT_COALESCE_MS", "not-a-number");
    assert_eq!(coalesce_window(), Duration::from_millis(10));

    std::env::remove_var("LOOKOUT_COALESCE_MS");
}

#[test]
#[serial_test::serial]
fn sink_buffer_rejects_zero() {
    std::env::set_var("LOOKOUT_SINK_BUFFER", "0");
    assert_eq!(sink_buffer(), 16);
    std::env::remove_var("LOOKOUT_SINK_BUFFER");
    assert_eq!(sink_buffer(), 16);
}
