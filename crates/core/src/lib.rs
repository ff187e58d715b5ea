// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lookout-core: domain vocabulary for the Lookout state-observation layer

pub mod event;
pub mod keys;
pub mod life;

pub use event::{RelationUnitsEvent, ScopeEvent, Settings, StatusInfo, UnitSettings};
pub use keys::{
    global_id, local_id, machine_from_ports_key, ports_key, reboot_key, KeyError, ScopeKey,
};
pub use life::Life;
