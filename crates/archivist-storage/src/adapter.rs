// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`ArchiveStore`] trait.

use async_trait::async_trait;
use tracing::debug;

use archivist_config::model::StorageConfig;
use archivist_core::types::{
    ArchiveEntry, Destination, DestinationKey, MonitoringLink, OwnerRecord, OwnerStatus, UserId,
    UserProfile,
};
use archivist_core::{AdapterType, ArchiveStore, ArchivistError, HealthStatus, PluginAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed document store.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Opens the database at the configured path and applies migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, ArchivistError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store initialized");
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ArchivistError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ArchivistError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl ArchiveStore for SqliteStore {
    async fn owner(&self, id: UserId) -> Result<Option<OwnerRecord>, ArchivistError> {
        queries::owners::get_owner(&self.db, id).await
    }

    async fn upsert_owner(&self, record: &OwnerRecord) -> Result<(), ArchivistError> {
        queries::owners::upsert_owner(&self.db, record).await
    }

    async fn set_owner_status(
        &self,
        id: UserId,
        status: OwnerStatus,
    ) -> Result<(), ArchivistError> {
        queries::owners::set_status(&self.db, id, status).await
    }

    async fn set_credential_present(
        &self,
        id: UserId,
        present: bool,
    ) -> Result<(), ArchivistError> {
        queries::owners::set_credential_present(&self.db, id, present).await
    }

    async fn record_profile(&self, profile: &UserProfile) -> Result<(), ArchivistError> {
        queries::owners::record_profile(&self.db, profile).await
    }

    async fn monitoring_links(&self, owner: UserId) -> Result<Vec<MonitoringLink>, ArchivistError> {
        queries::owners::links_for(&self.db, owner).await
    }

    async fn upsert_monitoring_link(&self, link: &MonitoringLink) -> Result<(), ArchivistError> {
        queries::owners::upsert_link(&self.db, link).await
    }

    async fn destination(
        &self,
        owner: UserId,
        key: DestinationKey,
    ) -> Result<Option<Destination>, ArchivistError> {
        queries::destinations::get_destination(&self.db, owner, key).await
    }

    async fn insert_destination(&self, destination: &Destination) -> Result<(), ArchivistError> {
        queries::destinations::insert_destination(&self.db, destination).await
    }

    async fn update_destination_access(
        &self,
        owner: UserId,
        key: DestinationKey,
        access_hash: i64,
    ) -> Result<(), ArchivistError> {
        queries::destinations::update_access_hash(&self.db, owner, key, access_hash).await
    }

    async fn delete_destination(
        &self,
        owner: UserId,
        key: DestinationKey,
    ) -> Result<(), ArchivistError> {
        queries::destinations::delete_destination(&self.db, owner, key).await
    }

    async fn append_entry(&self, entry: &ArchiveEntry) -> Result<(), ArchivistError> {
        queries::entries::append_entry(&self.db, entry).await
    }

    async fn entries_for(
        &self,
        owner: UserId,
        contact: UserId,
    ) -> Result<Vec<ArchiveEntry>, ArchivistError> {
        queries::entries::entries_for(&self.db, owner, contact).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::types::{ChannelHandle, Direction};
    use chrono::Utc;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn open_creates_database_and_reports_healthy() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let store = SqliteStore::open(&make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();

        assert!(db_path.exists(), "database file should be created");
        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.adapter_type(), AdapterType::Storage);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn full_lifecycle_through_trait_object() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store: Box<dyn ArchiveStore> = Box::new(
            SqliteStore::open(&make_config(db_path.to_str().unwrap()))
                .await
                .unwrap(),
        );

        let mut owner = OwnerRecord::new(UserId(1));
        owner.archiving_enabled = true;
        store.upsert_owner(&owner).await.unwrap();
        store.set_credential_present(UserId(1), true).await.unwrap();

        let key = DestinationKey::Contact(UserId(2));
        store
            .insert_destination(&Destination {
                owner_id: UserId(1),
                key,
                channel: ChannelHandle {
                    id: 77,
                    access_hash: 1,
                },
                title: "Bob".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .update_destination_access(UserId(1), key, 2)
            .await
            .unwrap();
        assert_eq!(
            store
                .destination(UserId(1), key)
                .await
                .unwrap()
                .unwrap()
                .channel
                .access_hash,
            2
        );

        store
            .append_entry(&ArchiveEntry {
                owner_id: UserId(1),
                contact_id: UserId(2),
                message_id: 10,
                direction: Direction::MeToOther,
                text: Some("hi".into()),
                forwarded: true,
                media: None,
                date: Utc::now(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(
            store.entries_for(UserId(1), UserId(2)).await.unwrap().len(),
            1
        );

        store
            .set_owner_status(UserId(1), OwnerStatus::Disabled)
            .await
            .unwrap();
        let loaded = store.owner(UserId(1)).await.unwrap().unwrap();
        assert_eq!(loaded.status, OwnerStatus::Disabled);
        assert!(loaded.credential_present);

        store.shutdown().await.unwrap();
    }
}
