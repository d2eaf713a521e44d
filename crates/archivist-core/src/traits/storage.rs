// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document-store seam: owner records, archive destinations, and the
//! append-only archive entry collection.

use async_trait::async_trait;

use crate::error::ArchivistError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ArchiveEntry, Destination, DestinationKey, MonitoringLink, OwnerRecord, OwnerStatus, UserId,
    UserProfile,
};

/// Typed CRUD over the records the core consumes.
#[async_trait]
pub trait ArchiveStore: PluginAdapter {
    async fn owner(&self, id: UserId) -> Result<Option<OwnerRecord>, ArchivistError>;

    async fn upsert_owner(&self, record: &OwnerRecord) -> Result<(), ArchivistError>;

    async fn set_owner_status(&self, id: UserId, status: OwnerStatus)
    -> Result<(), ArchivistError>;

    async fn set_credential_present(&self, id: UserId, present: bool)
    -> Result<(), ArchivistError>;

    /// Stores profile fields after a login and marks the owner active,
    /// creating the record if needed.
    async fn record_profile(&self, profile: &UserProfile) -> Result<(), ArchivistError>;

    /// Every link where `owner` is the monitored party.
    async fn monitoring_links(&self, owner: UserId)
    -> Result<Vec<MonitoringLink>, ArchivistError>;

    async fn upsert_monitoring_link(&self, link: &MonitoringLink) -> Result<(), ArchivistError>;

    async fn destination(
        &self,
        owner: UserId,
        key: DestinationKey,
    ) -> Result<Option<Destination>, ArchivistError>;

    async fn insert_destination(&self, destination: &Destination) -> Result<(), ArchivistError>;

    async fn update_destination_access(
        &self,
        owner: UserId,
        key: DestinationKey,
        access_hash: i64,
    ) -> Result<(), ArchivistError>;

    async fn delete_destination(
        &self,
        owner: UserId,
        key: DestinationKey,
    ) -> Result<(), ArchivistError>;

    async fn append_entry(&self, entry: &ArchiveEntry) -> Result<(), ArchivistError>;

    /// Entries for one (owner, contact) pair, oldest first.
    async fn entries_for(
        &self,
        owner: UserId,
        contact: UserId,
    ) -> Result<Vec<ArchiveEntry>, ArchivistError>;
}
