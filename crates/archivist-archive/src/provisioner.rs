// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive destinations and organizational folders.
//!
//! The provisioner is the only writer of the destination records and of the
//! folder and monitoring-channel caches. Creation for one key is serialized
//! through [`KeyedLocks`], so concurrent first events for the same contact
//! reuse a single channel.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use archivist_config::model::ArchiveConfig;
use archivist_core::types::{ChannelHandle, Destination, DestinationKey, GroupArchive, UserProfile};
use archivist_core::{
    ArchiveStore, ArchivistError, KeyedLocks, PlatformClient, PlatformError, UserId,
};
use archivist_resilience::Dispatcher;

use crate::must_propagate;

/// Folder used for monitoring channels when no slot could be resolved.
pub const MONITORING_FALLBACK_FOLDER: i32 = 3;

/// How many recent channels are searched when a channel must be found by
/// title or id.
const CHANNEL_SCAN_LIMIT: u32 = 100;

/// What a folder groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderPurpose {
    /// The owner's own private-chat destinations.
    Personal,
    /// A parent's view of one monitored child.
    Monitoring { child: UserId },
}

impl FolderPurpose {
    fn first_slot(&self) -> i32 {
        match self {
            Self::Personal => 2,
            Self::Monitoring { .. } => 3,
        }
    }

    fn emoticon(&self) -> &'static str {
        match self {
            Self::Personal => "📂",
            Self::Monitoring { .. } => "👶",
        }
    }
}

/// Outcome of probing a stored destination.
enum Verified {
    Usable(Destination),
    Gone,
}

pub struct Provisioner {
    store: Arc<dyn ArchiveStore>,
    dispatcher: Arc<Dispatcher>,
    locks: KeyedLocks<(UserId, DestinationKey)>,
    folder_locks: KeyedLocks<(UserId, FolderPurpose)>,
    folders: DashMap<(UserId, FolderPurpose), i32>,
    monitoring_locks: KeyedLocks<(UserId, UserId)>,
    monitoring_channels: DashMap<(UserId, i32, UserId), ChannelHandle>,
    personal_folder_title: String,
    max_folder_id: i32,
}

impl Provisioner {
    pub fn new(
        config: &ArchiveConfig,
        store: Arc<dyn ArchiveStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            locks: KeyedLocks::new(),
            folder_locks: KeyedLocks::new(),
            folders: DashMap::new(),
            monitoring_locks: KeyedLocks::new(),
            monitoring_channels: DashMap::new(),
            personal_folder_title: config.personal_folder_title.clone(),
            max_folder_id: config.max_folder_id,
        }
    }

    /// Destination channel for the owner's private chat with `contact`.
    /// New channels are filed into the owner's personal folder.
    pub async fn contact_destination(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        contact: &UserProfile,
    ) -> Result<Destination, ArchivistError> {
        let key = DestinationKey::Contact(contact.id);
        let _guard = self.locks.lock((owner, key)).await;
        if let Some(dest) = self.reusable(owner, client, key).await? {
            return Ok(dest);
        }

        let title = contact.display_name();
        let about = format!("Messages with {title}");
        let dest = self.create(owner, client, key, &title, &about).await?;

        let label = self.personal_folder_title.as_str();
        if let Some(folder) = self
            .folder(owner, client, FolderPurpose::Personal, label)
            .await?
        {
            let channel = dest.channel;
            if let Err(e) = self
                .dispatcher
                .call(owner, || client.add_to_folder(folder, channel))
                .await
            {
                if must_propagate(&e) {
                    return Err(e);
                }
                warn!(owner = %owner, folder, error = %e, "could not file destination into folder");
            }
        }
        Ok(dest)
    }

    /// Destination channel for a configured group archive.
    pub async fn group_destination(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        group: &GroupArchive,
    ) -> Result<Destination, ArchivistError> {
        let key = DestinationKey::Group(group.chat_id);
        let _guard = self.locks.lock((owner, key)).await;
        if let Some(dest) = self.reusable(owner, client, key).await? {
            return Ok(dest);
        }
        let title = format!("Archive: {}", group.title);
        let about = format!("Automatic archive for {} group messages", group.title);
        self.create(owner, client, key, &title, &about).await
    }

    /// The stored destination for `key` after verification and repair, or
    /// `None` if there is none or it is permanently gone.
    async fn reusable(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        key: DestinationKey,
    ) -> Result<Option<Destination>, ArchivistError> {
        let Some(dest) = self.store.destination(owner, key).await? else {
            return Ok(None);
        };
        match self.verify(owner, client, dest).await? {
            Verified::Usable(dest) => Ok(Some(dest)),
            Verified::Gone => {
                info!(owner = %owner, key = %key, "destination gone, recreating");
                self.store.delete_destination(owner, key).await?;
                Ok(None)
            }
        }
    }

    async fn verify(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        mut dest: Destination,
    ) -> Result<Verified, ArchivistError> {
        let channel = dest.channel;
        let fresh_hash = match self
            .dispatcher
            .call(owner, || client.get_channel(channel))
            .await
        {
            Ok(info) => {
                if info.left {
                    warn!(
                        owner = %owner,
                        channel_id = channel.id,
                        "owner left destination, rejoining"
                    );
                    let rejoin = ChannelHandle {
                        id: channel.id,
                        access_hash: info.access_hash,
                    };
                    if let Err(e) = self
                        .dispatcher
                        .call(owner, || client.join_channel(rejoin))
                        .await
                    {
                        if must_propagate(&e) {
                            return Err(e);
                        }
                        warn!(
                            owner = %owner,
                            channel_id = channel.id,
                            error = %e,
                            "rejoin failed, keeping destination"
                        );
                    }
                }
                info.access_hash
            }
            Err(ArchivistError::Platform(PlatformError::AccessHashInvalid)) => {
                match self.find_channel_by_id(owner, client, channel.id).await? {
                    Some(hash) => hash,
                    None => return Ok(Verified::Gone),
                }
            }
            Err(e) if must_propagate(&e) => return Err(e),
            Err(e) => {
                debug!(
                    owner = %owner,
                    channel_id = channel.id,
                    error = %e,
                    "destination check failed"
                );
                return Ok(Verified::Gone);
            }
        };

        if fresh_hash != channel.access_hash {
            info!(owner = %owner, channel_id = channel.id, "destination access hash rotated");
            self.store
                .update_destination_access(owner, dest.key, fresh_hash)
                .await?;
            dest.channel.access_hash = fresh_hash;
        }
        Ok(Verified::Usable(dest))
    }

    async fn find_channel_by_id(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        id: i64,
    ) -> Result<Option<i64>, ArchivistError> {
        match self
            .dispatcher
            .call(owner, || client.list_channels(CHANNEL_SCAN_LIMIT))
            .await
        {
            Ok(channels) => Ok(channels
                .into_iter()
                .find(|c| c.handle.id == id)
                .map(|c| c.handle.access_hash)),
            Err(e) if must_propagate(&e) => Err(e),
            Err(e) => {
                warn!(owner = %owner, channel_id = id, error = %e, "channel lookup failed");
                Ok(None)
            }
        }
    }

    async fn create(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        key: DestinationKey,
        title: &str,
        about: &str,
    ) -> Result<Destination, ArchivistError> {
        let channel = self
            .dispatcher
            .call(owner, || client.create_channel(title, about))
            .await?;
        let dest = Destination {
            owner_id: owner,
            key,
            channel,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_destination(&dest).await?;
        info!(owner = %owner, key = %key, channel_id = channel.id, title, "destination created");
        Ok(dest)
    }

    /// Folder for `purpose`, found by `label` or created in the first free
    /// slot below the configured maximum. `None` when no slot is free or the
    /// platform refused; only escalating errors are returned.
    pub async fn folder(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        purpose: FolderPurpose,
        label: &str,
    ) -> Result<Option<i32>, ArchivistError> {
        let key = (owner, purpose);
        if let Some(id) = self.folders.get(&key) {
            return Ok(Some(*id));
        }
        let _guard = self.folder_locks.lock(key).await;
        if let Some(id) = self.folders.get(&key) {
            return Ok(Some(*id));
        }

        match self
            .find_or_create_folder(owner, client, purpose, label)
            .await
        {
            Ok(Some(id)) => {
                self.folders.insert(key, id);
                Ok(Some(id))
            }
            Ok(None) => {
                warn!(owner = %owner, label, "no free folder slot");
                Ok(None)
            }
            Err(e) if must_propagate(&e) => Err(e),
            Err(e) => {
                warn!(owner = %owner, label, error = %e, "folder lookup failed");
                Ok(None)
            }
        }
    }

    async fn find_or_create_folder(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        purpose: FolderPurpose,
        label: &str,
    ) -> Result<Option<i32>, ArchivistError> {
        let existing = self
            .dispatcher
            .call(owner, || client.list_folders())
            .await?;
        if let Some(folder) = existing.iter().find(|f| f.title == label) {
            return Ok(Some(folder.id));
        }
        let Some(slot) = (purpose.first_slot()..self.max_folder_id)
            .find(|id| existing.iter().all(|f| f.id != *id))
        else {
            return Ok(None);
        };
        self.dispatcher
            .call(owner, || {
                client.create_folder(slot, label, purpose.emoticon(), &[])
            })
            .await?;
        info!(owner = %owner, folder = slot, label, "folder created");
        Ok(Some(slot))
    }

    /// A parent's broadcast channel for one contact of one child, filed into
    /// `folder`. Reuses a channel with the contact's name when one exists.
    pub async fn monitoring_channel(
        &self,
        parent: UserId,
        client: &dyn PlatformClient,
        folder: i32,
        contact: UserId,
        contact_name: &str,
    ) -> Result<ChannelHandle, ArchivistError> {
        let key = (parent, folder, contact);
        if let Some(handle) = self.monitoring_channels.get(&key) {
            return Ok(*handle);
        }
        let _guard = self.monitoring_locks.lock((parent, contact)).await;
        if let Some(handle) = self.monitoring_channels.get(&key) {
            return Ok(*handle);
        }

        let existing = match self
            .dispatcher
            .call(parent, || client.list_channels(CHANNEL_SCAN_LIMIT))
            .await
        {
            Ok(channels) => channels
                .into_iter()
                .find(|c| c.broadcast && c.title == contact_name)
                .map(|c| c.handle),
            Err(e) if must_propagate(&e) => return Err(e),
            Err(e) => {
                warn!(parent = %parent, error = %e, "channel scan failed, creating");
                None
            }
        };

        let handle = match existing {
            Some(handle) => handle,
            None => {
                let about = format!("Messages with {contact_name}");
                let handle = self
                    .dispatcher
                    .call(parent, || client.create_channel(contact_name, &about))
                    .await?;
                if let Err(e) = self
                    .dispatcher
                    .call(parent, || client.add_to_folder(folder, handle))
                    .await
                {
                    if must_propagate(&e) {
                        return Err(e);
                    }
                    warn!(
                        parent = %parent,
                        folder,
                        error = %e,
                        "could not file monitoring channel"
                    );
                }
                info!(
                    parent = %parent,
                    contact_id = %contact,
                    channel_id = handle.id,
                    "monitoring channel created"
                );
                handle
            }
        };
        self.monitoring_channels.insert(key, handle);
        Ok(handle)
    }

    /// Forgets a cached monitoring channel after a delivery into it failed.
    pub fn forget_monitoring_channel(&self, parent: UserId, contact: UserId) {
        self.monitoring_channels
            .retain(|(p, _, c), _| !(*p == parent && *c == contact));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::types::ArchivePolicy;
    use archivist_resilience::CircuitBreaker;
    use archivist_test_utils::fixtures::profile;
    use archivist_test_utils::{MemoryStore, MockPlatform};

    const OWNER: UserId = UserId(1);

    struct Harness {
        store: Arc<MemoryStore>,
        platform: Arc<MockPlatform>,
        provisioner: Arc<Provisioner>,
    }

    fn dispatcher() -> Arc<Dispatcher> {
        let breaker = CircuitBreaker::new();
        Arc::new(Dispatcher::new(Default::default(), Default::default(), breaker))
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let config = ArchiveConfig::default();
        let provisioner = Arc::new(Provisioner::new(&config, store.clone(), dispatcher()));
        Harness {
            store,
            platform: Arc::new(MockPlatform::new(profile(1, "Owner"))),
            provisioner,
        }
    }

    #[tokio::test]
    async fn creates_once_and_files_into_personal_folder() {
        let h = harness();
        let ann = profile(2, "Ann");
        let dest = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &ann)
            .await
            .unwrap();
        assert_eq!(dest.title, "Ann");
        let channel = h.platform.channel(dest.channel.id).unwrap();
        assert_eq!(channel.about, "Messages with Ann");

        let folders = h.platform.folders();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].folder.id, 2);
        assert_eq!(folders[0].folder.title, "Oblivion");
        assert_eq!(folders[0].emoticon, "📂");
        assert_eq!(folders[0].channels, vec![dest.channel.id]);

        let again = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &ann)
            .await
            .unwrap();
        assert_eq!(again.channel, dest.channel);
        assert_eq!(h.platform.call_count("create_channel"), 1);
        assert_eq!(h.platform.call_count("list_folders"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_events_share_one_destination() {
        let h = harness();
        let mut tasks = Vec::new();
        for _ in 0..10 {
            let provisioner = h.provisioner.clone();
            let platform = h.platform.clone();
            tasks.push(tokio::spawn(async move {
                provisioner
                    .contact_destination(OWNER, platform.as_ref(), &profile(2, "Ann"))
                    .await
                    .unwrap()
            }));
        }
        let mut ids = Vec::new();
        for t in tasks {
            ids.push(t.await.unwrap().channel.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(h.store.destinations().len(), 1);
        assert_eq!(h.platform.call_count("create_channel"), 1);
    }

    #[tokio::test]
    async fn rejoins_when_owner_left() {
        let h = harness();
        let dest = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        h.platform.leave_channel(dest.channel.id);

        let again = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        assert_eq!(again.channel, dest.channel);
        let state = h.platform.channel(dest.channel.id).unwrap();
        assert!(!state.left);
        assert_eq!(state.joins, 1);
    }

    #[tokio::test]
    async fn rotated_access_hash_is_persisted() {
        let h = harness();
        let dest = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        h.platform.rotate_access_hash(dest.channel.id, 4242);

        let again = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        assert_eq!(again.channel.access_hash, 4242);
        let stored = h
            .store
            .destination(OWNER, DestinationKey::Contact(UserId(2)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.channel.access_hash, 4242);
    }

    #[tokio::test]
    async fn invalid_hash_is_recovered_from_channel_list() {
        let h = harness();
        let dest = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        h.platform.rotate_access_hash(dest.channel.id, 99);
        h.platform
            .fail_next("get_channel", PlatformError::AccessHashInvalid);

        let again = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        assert_eq!(again.channel.id, dest.channel.id);
        assert_eq!(again.channel.access_hash, 99);
        assert_eq!(h.platform.call_count("create_channel"), 1);
    }

    #[tokio::test]
    async fn deleted_channel_is_replaced() {
        let h = harness();
        let dest = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        h.platform.remove_channel(dest.channel.id);

        let again = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        assert_ne!(again.channel.id, dest.channel.id);
        assert_eq!(h.store.destinations().len(), 1);
        assert_eq!(h.store.destinations()[0].channel, again.channel);
    }

    #[tokio::test]
    async fn escalating_channel_check_errors_propagate() {
        let h = harness();
        h.provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        h.platform.fail_next(
            "get_channel",
            PlatformError::Revoked {
                reason: "AUTH_KEY_UNREGISTERED".into(),
            },
        );
        let err = h
            .provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap_err();
        assert!(err.is_escalating());
        assert_eq!(h.store.destinations().len(), 1);
    }

    #[tokio::test]
    async fn group_destination_title() {
        let h = harness();
        let group = GroupArchive {
            chat_id: -1_000_000_000_777,
            title: "Team".into(),
            policy: ArchivePolicy::default(),
        };
        let dest = h
            .provisioner
            .group_destination(OWNER, h.platform.as_ref(), &group)
            .await
            .unwrap();
        assert_eq!(dest.title, "Archive: Team");
        assert_eq!(
            h.platform.channel(dest.channel.id).unwrap().about,
            "Automatic archive for Team group messages"
        );
        assert!(h.platform.folders().is_empty());
    }

    #[tokio::test]
    async fn folders_skip_taken_slots_and_reuse_by_label() {
        let h = harness();
        h.platform
            .create_folder(3, "Work", "💼", &[])
            .await
            .unwrap();
        let kid = FolderPurpose::Monitoring { child: UserId(9) };
        let id = h
            .provisioner
            .folder(UserId(5), h.platform.as_ref(), kid, "Kid")
            .await
            .unwrap();
        assert_eq!(id, Some(4));

        // A fresh provisioner finds the folder by its label.
        let other = harness();
        let folders = h.platform.folders();
        let config = ArchiveConfig::default();
        let found = Provisioner::new(&config, other.store.clone(), dispatcher())
            .folder(UserId(5), h.platform.as_ref(), kid, "Kid")
            .await
            .unwrap();
        assert_eq!(found, Some(4));
        assert_eq!(h.platform.folders().len(), folders.len());
    }

    #[tokio::test]
    async fn no_free_slot_degrades_to_none() {
        let h = harness();
        let config = ArchiveConfig {
            max_folder_id: 3,
            ..ArchiveConfig::default()
        };
        let provisioner = Provisioner::new(&config, h.store.clone(), dispatcher());
        h.platform.create_folder(2, "Mine", "⭐", &[]).await.unwrap();
        let platform = h.platform.as_ref();
        let id = provisioner
            .folder(OWNER, platform, FolderPurpose::Personal, "Oblivion")
            .await
            .unwrap();
        assert_eq!(id, None);

        // Destinations are still created without a folder.
        let dest = provisioner
            .contact_destination(OWNER, h.platform.as_ref(), &profile(2, "Ann"))
            .await
            .unwrap();
        assert!(h.platform.channel(dest.channel.id).is_some());
    }

    #[tokio::test]
    async fn monitoring_channel_reuses_existing_by_title() {
        let h = harness();
        let existing = h.platform.add_channel("Ann");
        let handle = h
            .provisioner
            .monitoring_channel(UserId(5), h.platform.as_ref(), 3, UserId(2), "Ann")
            .await
            .unwrap();
        assert_eq!(handle, existing);
        assert_eq!(h.platform.call_count("create_channel"), 0);

        let created = h
            .provisioner
            .monitoring_channel(UserId(5), h.platform.as_ref(), 3, UserId(7), "Bob")
            .await
            .unwrap();
        assert_ne!(created, existing);
        let folder_calls = h.platform.call_count("add_to_folder");
        assert_eq!(folder_calls, 1);

        // Cached afterwards.
        h.provisioner
            .monitoring_channel(UserId(5), h.platform.as_ref(), 3, UserId(7), "Bob")
            .await
            .unwrap();
        assert_eq!(h.platform.call_count("create_channel"), 1);
    }
}
