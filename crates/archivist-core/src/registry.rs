// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authoritative owner → live connection map.

use std::sync::Arc;

use dashmap::DashMap;

use crate::traits::PlatformClient;
use crate::types::UserId;

/// Live connections keyed by owner.
///
/// The session supervisor is the only writer; everything else (monitoring
/// fan-out, the control API) only reads.
#[derive(Default)]
pub struct SessionRegistry {
    live: DashMap<UserId, Arc<dyn PlatformClient>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: UserId) -> Option<Arc<dyn PlatformClient>> {
        self.live.get(&owner).map(|c| c.value().clone())
    }

    pub fn contains(&self, owner: UserId) -> bool {
        self.live.contains_key(&owner)
    }

    /// Inserts unless a connection is already present; returns the one in
    /// the map afterwards.
    pub fn insert_if_absent(
        &self,
        owner: UserId,
        client: Arc<dyn PlatformClient>,
    ) -> Arc<dyn PlatformClient> {
        self.live.entry(owner).or_insert(client).value().clone()
    }

    pub fn remove(&self, owner: UserId) -> Option<Arc<dyn PlatformClient>> {
        self.live.remove(&owner).map(|(_, c)| c)
    }

    /// Removes the entry only if it is still `client`.
    pub fn remove_if_same(&self, owner: UserId, client: &Arc<dyn PlatformClient>) -> bool {
        self.live
            .remove_if(&owner, |_, live| {
                std::ptr::addr_eq(Arc::as_ptr(live), Arc::as_ptr(client))
            })
            .is_some()
    }

    pub fn owners(&self) -> Vec<UserId> {
        self.live.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
