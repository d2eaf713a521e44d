// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `ArchiveStore` with the same uniqueness rules as the SQLite store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use archivist_core::types::{
    ArchiveEntry, Destination, DestinationKey, MonitoringLink, OwnerRecord, OwnerStatus,
    UserProfile,
};
use archivist_core::{
    AdapterType, ArchiveStore, ArchivistError, HealthStatus, PluginAdapter, UserId,
};

#[derive(Default)]
struct Tables {
    owners: HashMap<UserId, OwnerRecord>,
    links: Vec<MonitoringLink>,
    destinations: HashMap<(UserId, DestinationKey), Destination>,
    entries: Vec<ArchiveEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.tables().destinations.values().cloned().collect()
    }

    pub fn all_entries(&self) -> Vec<ArchiveEntry> {
        self.tables().entries.clone()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ArchivistError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    async fn owner(&self, id: UserId) -> Result<Option<OwnerRecord>, ArchivistError> {
        Ok(self.tables().owners.get(&id).cloned())
    }

    async fn upsert_owner(&self, record: &OwnerRecord) -> Result<(), ArchivistError> {
        self.tables().owners.insert(record.id, record.clone());
        Ok(())
    }

    async fn set_owner_status(
        &self,
        id: UserId,
        status: OwnerStatus,
    ) -> Result<(), ArchivistError> {
        if let Some(owner) = self.tables().owners.get_mut(&id) {
            owner.status = status;
        }
        Ok(())
    }

    async fn set_credential_present(
        &self,
        id: UserId,
        present: bool,
    ) -> Result<(), ArchivistError> {
        if let Some(owner) = self.tables().owners.get_mut(&id) {
            owner.credential_present = present;
        }
        Ok(())
    }

    async fn record_profile(&self, profile: &UserProfile) -> Result<(), ArchivistError> {
        let mut tables = self.tables();
        let owner = tables
            .owners
            .entry(profile.id)
            .or_insert_with(|| OwnerRecord::new(profile.id));
        owner.status = OwnerStatus::Active;
        owner.first_name = profile.first_name.clone();
        owner.username = profile.username.clone();
        owner.phone = profile.phone.clone();
        Ok(())
    }

    async fn monitoring_links(&self, owner: UserId) -> Result<Vec<MonitoringLink>, ArchivistError> {
        Ok(self
            .tables()
            .links
            .iter()
            .filter(|l| l.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn upsert_monitoring_link(&self, link: &MonitoringLink) -> Result<(), ArchivistError> {
        let mut tables = self.tables();
        match tables
            .links
            .iter_mut()
            .find(|l| l.owner_id == link.owner_id && l.parent_id == link.parent_id)
        {
            Some(existing) => {
                existing.status = link.status;
                existing.expires_at = link.expires_at;
            }
            None => tables.links.push(link.clone()),
        }
        Ok(())
    }

    async fn destination(
        &self,
        owner: UserId,
        key: DestinationKey,
    ) -> Result<Option<Destination>, ArchivistError> {
        Ok(self.tables().destinations.get(&(owner, key)).cloned())
    }

    async fn insert_destination(&self, destination: &Destination) -> Result<(), ArchivistError> {
        let mut tables = self.tables();
        let k = (destination.owner_id, destination.key);
        let channel_taken = tables
            .destinations
            .values()
            .any(|d| d.channel.id == destination.channel.id);
        if tables.destinations.contains_key(&k) || channel_taken {
            return Err(ArchivistError::Internal(format!(
                "duplicate destination {} for owner {}",
                destination.key, destination.owner_id
            )));
        }
        tables.destinations.insert(k, destination.clone());
        Ok(())
    }

    async fn update_destination_access(
        &self,
        owner: UserId,
        key: DestinationKey,
        access_hash: i64,
    ) -> Result<(), ArchivistError> {
        if let Some(d) = self.tables().destinations.get_mut(&(owner, key)) {
            d.channel.access_hash = access_hash;
        }
        Ok(())
    }

    async fn delete_destination(
        &self,
        owner: UserId,
        key: DestinationKey,
    ) -> Result<(), ArchivistError> {
        self.tables().destinations.remove(&(owner, key));
        Ok(())
    }

    async fn append_entry(&self, entry: &ArchiveEntry) -> Result<(), ArchivistError> {
        self.tables().entries.push(entry.clone());
        Ok(())
    }

    async fn entries_for(
        &self,
        owner: UserId,
        contact: UserId,
    ) -> Result<Vec<ArchiveEntry>, ArchivistError> {
        let mut entries: Vec<ArchiveEntry> = self
            .tables()
            .entries
            .iter()
            .filter(|e| e.owner_id == owner && e.contact_id == contact)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }
}
