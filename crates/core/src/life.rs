// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity lifecycle state machine

use serde::{Deserialize, Serialize};

/// Lifecycle state attached to every cluster entity.
///
/// Transitions are monotonic: `Alive → Dying → Dead`, never backwards.
/// For observers, an entity seen `Dead` and an entity whose document has
/// been removed are equivalent; both are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    Alive,
    Dying,
    Dead,
}

impl Life {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Staying in the same state is legal; moving backwards is not.
    pub fn can_become(&self, next: Life) -> bool {
        next >= *self
    }
}

impl std::fmt::Display for Life {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Alive => "alive",
            Self::Dying => "dying",
            Self::Dead => "dead",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "life_tests.rs"]
mod tests;
