// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for store reads and the change log

use thiserror::Error;

/// Errors surfaced by the document store and its change log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The change log ended without reporting a cause.
    #[error("change log closed")]
    Closed,

    #[error("store i/o error: {0}")]
    Io(String),

    #[error("corrupt document {0:?}")]
    Corrupt(String),
}
