// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The read-side contract the watchers require from the document store.

use crate::docs::{MachineUnits, SettingsDoc, StatusDoc, UnitAttachment};
use crate::error::StoreError;
use lookout_core::{Life, ScopeKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Pure id predicate shared between store queries and hub subscriptions.
///
/// Applied to stored (model-prefixed) ids on the hub task; must be cheap
/// and must not block.
pub type IdFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Purpose-specific projections the watchers read.
///
/// The transactional layer owns the general document API; watchers only
/// ever need lifecycle, membership, and revision reads, batched where the
/// merge algorithms batch them. All ids are stored (model-prefixed) ids.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Ids and lifecycle of every document in `collection` matching
    /// `filter`. Used for a lifecycle watcher's initial query.
    async fn lives_matching(
        &self,
        collection: &str,
        filter: &IdFilter,
    ) -> Result<Vec<(String, Life)>, StoreError>;

    /// Batch lifecycle requery; ids absent from the result no longer
    /// exist.
    async fn lives_of(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Life>, StoreError>;

    /// Ids of every document in `collection` matching `filter`.
    async fn ids_matching(
        &self,
        collection: &str,
        filter: &IdFilter,
    ) -> Result<Vec<String>, StoreError>;

    /// Current revision of one document, `None` when absent.
    async fn revision_of(&self, collection: &str, id: &str) -> Result<Option<i64>, StoreError>;

    /// Scope keys of every non-departing scope document whose id starts
    /// with `id_prefix`.
    async fn scope_members(&self, id_prefix: &str) -> Result<Vec<ScopeKey>, StoreError>;

    /// The `departing` flag of one scope document, `None` when absent.
    async fn scope_departing(&self, id: &str) -> Result<Option<bool>, StoreError>;

    /// A settings document, `None` when absent.
    async fn settings(&self, id: &str) -> Result<Option<SettingsDoc>, StoreError>;

    /// A machine's declared principal-unit list, `None` when the machine
    /// document is absent.
    async fn machine_units(&self, id: &str) -> Result<Option<MachineUnits>, StoreError>;

    /// A unit's attachment projection, `None` when the unit document is
    /// absent.
    async fn unit_attachment(&self, id: &str) -> Result<Option<UnitAttachment>, StoreError>;

    /// A status document, `None` when absent.
    async fn status(&self, id: &str) -> Result<Option<StatusDoc>, StoreError>;
}
