// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-event archive pipeline.
//!
//! Private chats: resolve the contact, apply the owner's policy, forward into
//! the contact's destination (or reconstruct from metadata and media when
//! forwarding is refused), mirror to saved messages, record an archive entry
//! for tracked contacts, then fan out to monitoring parents.
//!
//! Groups: only groups the owner configured, same forward-or-reconstruct
//! delivery, no entries and no fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use archivist_config::model::ArchiveConfig;
use archivist_core::types::{
    ArchiveEntry, ArchivePolicy, ChatRef, Destination, Direction, GroupArchive, InboundMessage,
    MediaDescriptor, OwnerRecord, Peer, UserProfile,
};
use archivist_core::{
    ArchiveStore, ArchivistError, ControlSurface, MessageHandler, PlatformClient, SessionRegistry,
    UserId,
};
use archivist_prometheus::{DeliveryMode, record_archived};
use archivist_resilience::Dispatcher;

use crate::batch::{BatchClaim, BatchKey, MediaGroupBatcher};
use crate::fanout::{ArchivedMessage, MonitoringFanout};
use crate::format;
use crate::media::{MediaStore, ScratchFile};
use crate::must_propagate;
use crate::provisioner::Provisioner;
use crate::reply_map::ReplyMap;
use crate::tracking::TrackingRegistry;

/// How far back media-group siblings are searched.
const GROUP_SCAN_LIMIT: u32 = 100;

/// What happened to one archived private message.
struct Delivered {
    message: InboundMessage,
    forwarded: bool,
    scratch: Option<ScratchFile>,
    media: Option<MediaDescriptor>,
}

/// Everything the private flow knows about the conversation.
struct PrivateChat<'a> {
    owner: &'a OwnerRecord,
    contact: &'a UserProfile,
    client: &'a dyn PlatformClient,
    policy: ArchivePolicy,
    tracked: bool,
}

impl PrivateChat<'_> {
    fn owner_name(&self) -> &str {
        self.owner.first_name.as_deref().unwrap_or("Me")
    }
}

pub struct ArchivePipeline {
    store: Arc<dyn ArchiveStore>,
    dispatcher: Arc<Dispatcher>,
    provisioner: Arc<Provisioner>,
    media: MediaStore,
    tracking: Arc<TrackingRegistry>,
    replies: ReplyMap,
    batcher: MediaGroupBatcher,
    fanout: MonitoringFanout,
}

impl ArchivePipeline {
    pub fn new(
        config: &ArchiveConfig,
        store: Arc<dyn ArchiveStore>,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<SessionRegistry>,
        control: Arc<dyn ControlSurface>,
        tracking: Arc<TrackingRegistry>,
    ) -> Self {
        let provisioner = Arc::new(Provisioner::new(config, store.clone(), dispatcher.clone()));
        let media = MediaStore::new(config, dispatcher.clone());
        let fanout = MonitoringFanout::new(
            store.clone(),
            registry,
            control,
            dispatcher.clone(),
            provisioner.clone(),
            media.clone(),
        );
        let window = std::time::Duration::from_millis(config.media_group_window_ms);
        Self {
            store,
            dispatcher,
            provisioner,
            media,
            tracking,
            replies: ReplyMap::new(),
            batcher: MediaGroupBatcher::new(window),
            fanout,
        }
    }

    pub fn provisioner(&self) -> &Arc<Provisioner> {
        &self.provisioner
    }

    pub fn tracking(&self) -> &Arc<TrackingRegistry> {
        &self.tracking
    }

    pub fn replies(&self) -> &ReplyMap {
        &self.replies
    }

    async fn archive_private(
        &self,
        owner_id: UserId,
        client: &dyn PlatformClient,
        contact_id: UserId,
        msg: &InboundMessage,
    ) -> Result<(), ArchivistError> {
        if contact_id == owner_id {
            return Ok(());
        }
        let contact = match self
            .dispatcher
            .call(owner_id, || client.resolve_user(contact_id))
            .await
        {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                debug!(
                    owner = %owner_id,
                    contact_id = %contact_id,
                    "contact not resolvable, skipping"
                );
                return Ok(());
            }
            Err(e) if must_propagate(&e) => return Err(e),
            Err(e) => {
                debug!(
                    owner = %owner_id,
                    contact_id = %contact_id,
                    error = %e,
                    "contact lookup failed, skipping"
                );
                return Ok(());
            }
        };
        if contact.is_bot {
            return Ok(());
        }
        let username = contact.username.as_deref();
        let phone = contact.phone.as_deref();
        if let Err(e) = self.tracking.resolve(contact.id, username, phone).await {
            warn!(contact_id = %contact.id, error = %e, "tracking list not updated");
        }

        let Some(owner) = self.store.owner(owner_id).await? else {
            return Ok(());
        };
        if !owner.is_active() || !owner.archiving_enabled {
            return Ok(());
        }
        let policy = owner.policy_for_contact(contact.id);
        if !policy.applied_to(msg).any() {
            return Ok(());
        }

        let Some((_claim, items)) = self.batch(owner_id, client, msg).await? else {
            return Ok(());
        };
        let items: Vec<InboundMessage> = items
            .into_iter()
            .filter(|m| policy.applied_to(m).any())
            .collect();
        if items.is_empty() {
            return Ok(());
        }

        let chat = PrivateChat {
            owner: &owner,
            contact: &contact,
            client,
            policy,
            tracked: self.tracking.is_tracked(contact.id).await,
        };
        let dest = self
            .provisioner
            .contact_destination(owner_id, client, &contact)
            .await?;

        let ids: Vec<i32> = items.iter().map(|m| m.id).collect();
        let reply_to = items.first().and_then(|m| m.reply_to);
        let forwarded = self
            .forward_threaded(owner_id, client, msg.chat, &ids, dest.peer(), reply_to)
            .await?;

        let mut delivered = Vec::with_capacity(items.len());
        if forwarded.is_some() {
            for message in items {
                record_archived(DeliveryMode::Forwarded);
                delivered.push(Delivered {
                    message,
                    forwarded: true,
                    scratch: None,
                    media: None,
                });
            }
        } else {
            for message in items {
                delivered.push(self.reconstruct_private(&chat, &dest, message).await?);
            }
        }
        info!(
            owner = %owner_id,
            contact_id = %contact.id,
            count = delivered.len(),
            forwarded = forwarded.is_some(),
            "private message archived"
        );

        for item in delivered {
            if owner.archive_mode.mirrors_to_saved() {
                self.mirror_to_saved(&chat, &item.message).await;
            }
            if chat.tracked {
                self.append_entry(&chat, &item).await;
            }
            let archived = ArchivedMessage {
                owner: &owner,
                contact: &contact,
                message: &item.message,
                scratch: item.scratch.as_ref(),
            };
            self.fanout.on_archived(client, &archived).await;
            if let Some(file) = item.scratch {
                file.discard().await;
            }
        }
        Ok(())
    }

    /// The messages to archive for this event: the event itself, or every
    /// sibling of its media group when this event leads the group. `None`
    /// when another event already leads the group.
    async fn batch(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        msg: &InboundMessage,
    ) -> Result<Option<(Option<BatchClaim<'_>>, Vec<InboundMessage>)>, ArchivistError> {
        let Some(grouped_id) = msg.grouped_id else {
            return Ok(Some((None, vec![msg.clone()])));
        };
        let key = BatchKey {
            owner,
            conversation: msg.chat.conversation_id(),
            grouped_id,
        };
        let Some(claim) = self.batcher.claim(key) else {
            debug!(owner = %owner, grouped_id, "media group already handled");
            return Ok(None);
        };
        self.batcher.wait_window().await;

        let recent = match self
            .dispatcher
            .call(owner, || client.recent_messages(msg.chat, GROUP_SCAN_LIMIT))
            .await
        {
            Ok(recent) => recent,
            Err(e) if must_propagate(&e) => return Err(e),
            Err(e) => {
                warn!(owner = %owner, grouped_id, error = %e, "could not collect media group");
                Vec::new()
            }
        };
        let mut items: Vec<InboundMessage> = recent
            .into_iter()
            .filter(|m| m.grouped_id == Some(grouped_id))
            .collect();
        if !items.iter().any(|m| m.id == msg.id) {
            items.push(msg.clone());
        }
        items.sort_by_key(|m| m.id);
        debug!(owner = %owner, grouped_id, count = items.len(), "media group collected");
        Ok(Some((Some(claim), items)))
    }

    /// Forwards `ids` into `peer`, then re-anchors the copies under the
    /// archived parent when the first message replies to a mapped one.
    /// `Ok(None)` means the forward was refused and the caller must
    /// reconstruct.
    async fn forward_threaded(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        chat: ChatRef,
        ids: &[i32],
        peer: Peer,
        reply_to: Option<i32>,
    ) -> Result<Option<Vec<i32>>, ArchivistError> {
        let conversation = chat.conversation_id();
        let copies = match self
            .dispatcher
            .call(owner, || client.forward_messages(chat, ids, peer, None))
            .await
        {
            Ok(copies) if !copies.is_empty() => copies,
            Ok(_) => {
                debug!(owner = %owner, "forward produced no copy, reconstructing");
                return Ok(None);
            }
            Err(e) if must_propagate(&e) => return Err(e),
            Err(e) => {
                debug!(owner = %owner, error = %e, "forward refused, reconstructing");
                return Ok(None);
            }
        };
        self.record_replies(owner, conversation, ids, &copies);

        let Some(anchor) = reply_to.and_then(|parent| self.replies.get(owner, conversation, parent))
        else {
            return Ok(Some(copies));
        };
        match self
            .dispatcher
            .call(owner, || {
                client.forward_messages(chat, ids, peer, Some(anchor))
            })
            .await
        {
            Ok(anchored) if !anchored.is_empty() => {
                if let Err(e) = self
                    .dispatcher
                    .call(owner, || client.delete_messages(peer, &copies))
                    .await
                {
                    if must_propagate(&e) {
                        return Err(e);
                    }
                    warn!(owner = %owner, error = %e, "unanchored copy not deleted");
                }
                self.record_replies(owner, conversation, ids, &anchored);
                debug!(owner = %owner, anchor, "reply chain preserved");
                Ok(Some(anchored))
            }
            Ok(_) => {
                warn!(
                    owner = %owner,
                    anchor,
                    "anchored forward produced no copy, keeping unanchored one"
                );
                Ok(Some(copies))
            }
            Err(e) if must_propagate(&e) => Err(e),
            Err(e) => {
                warn!(
                    owner = %owner,
                    anchor,
                    error = %e,
                    "anchored forward failed, keeping unanchored one"
                );
                Ok(Some(copies))
            }
        }
    }

    fn record_replies(&self, owner: UserId, conversation: i64, sources: &[i32], copies: &[i32]) {
        for (source, copy) in sources.iter().zip(copies) {
            self.replies.record(owner, conversation, *source, *copy);
        }
    }

    /// Metadata header plus, when the media policy applies, a re-uploaded
    /// copy of the media.
    async fn reconstruct_private(
        &self,
        chat: &PrivateChat<'_>,
        dest: &Destination,
        message: InboundMessage,
    ) -> Result<Delivered, ArchivistError> {
        let owner = chat.owner.id;
        let client = chat.client;
        let peer = dest.peer();
        let conversation = message.chat.conversation_id();
        let applies = chat.policy.applied_to(&message);
        let direction = Direction::from_outgoing(message.outgoing);
        let contact_name = chat.contact.display_name();
        let anchor = message
            .reply_to
            .and_then(|parent| self.replies.get(owner, conversation, parent));

        let header = format::private_header(
            direction,
            chat.owner_name(),
            &contact_name,
            message.date,
            message.id,
            message.text.as_deref().filter(|_| applies.text),
        );
        match self
            .dispatcher
            .call(owner, || client.send_text(peer, &header, anchor))
            .await
        {
            Ok(id) => self.replies.record(owner, conversation, message.id, id),
            Err(e) if must_propagate(&e) => return Err(e),
            Err(e) => {
                warn!(
                    owner = %owner,
                    message_id = message.id,
                    error = %e,
                    "metadata header not delivered"
                );
            }
        }

        let mut scratch = None;
        let mut media = None;
        if applies.media {
            match self.media.download(owner, client, &message).await {
                Ok(file) => {
                    let caption = format::media_caption(direction, &contact_name, &message);
                    match self
                        .dispatcher
                        .call(owner, || {
                            client.send_file(peer, file.path(), &caption, anchor)
                        })
                        .await
                    {
                        Ok(_) => {}
                        Err(e) if must_propagate(&e) => {
                            file.discard().await;
                            return Err(e);
                        }
                        Err(e) => {
                            warn!(
                                owner = %owner,
                                message_id = message.id,
                                error = %e,
                                "media upload failed"
                            )
                        }
                    }
                    let retained = if chat.tracked {
                        match self
                            .media
                            .retain(owner, chat.contact.id, message.id, &file)
                            .await
                        {
                            Ok(path) => Some(path),
                            Err(e) => {
                                warn!(
                                    owner = %owner,
                                    message_id = message.id,
                                    error = %e,
                                    "media not retained"
                                );
                                None
                            }
                        }
                    } else {
                        None
                    };
                    media = Some(self.media.describe(&message, &file, retained.as_deref()));
                    scratch = Some(file);
                }
                Err(e) if must_propagate(&e) => return Err(e),
                Err(e) => {
                    warn!(
                        owner = %owner,
                        message_id = message.id,
                        error = %e,
                        "media dropped from archive"
                    );
                }
            }
        }
        record_archived(DeliveryMode::Reconstructed);
        Ok(Delivered {
            message,
            forwarded: false,
            scratch,
            media,
        })
    }

    /// Best-effort copy into the owner's saved messages.
    async fn mirror_to_saved(&self, chat: &PrivateChat<'_>, message: &InboundMessage) {
        let owner = chat.owner.id;
        let client = chat.client;
        let ids = [message.id];
        let forwarded = self
            .dispatcher
            .call(owner, || {
                client.forward_messages(message.chat, &ids, Peer::SavedMessages, None)
            })
            .await;
        let Err(e) = forwarded else {
            return;
        };
        debug!(owner = %owner, message_id = message.id, error = %e, "saved mirror forward refused");
        let header = format::private_header(
            Direction::from_outgoing(message.outgoing),
            chat.owner_name(),
            &chat.contact.display_name(),
            message.date,
            message.id,
            message.text.as_deref(),
        );
        if let Err(e) = self
            .dispatcher
            .call(owner, || {
                client.send_text(Peer::SavedMessages, &header, None)
            })
            .await
        {
            warn!(owner = %owner, message_id = message.id, error = %e, "saved mirror failed");
        }
    }

    async fn append_entry(&self, chat: &PrivateChat<'_>, item: &Delivered) {
        let entry = ArchiveEntry {
            owner_id: chat.owner.id,
            contact_id: chat.contact.id,
            message_id: item.message.id,
            direction: Direction::from_outgoing(item.message.outgoing),
            text: item.message.text.clone().filter(|t| !t.is_empty()),
            forwarded: item.forwarded,
            media: item.media.clone(),
            date: item.message.date,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.append_entry(&entry).await {
            warn!(
                owner = %chat.owner.id,
                message_id = item.message.id,
                error = %e,
                "archive entry not written"
            );
        }
    }

    async fn archive_group(
        &self,
        owner_id: UserId,
        client: &dyn PlatformClient,
        msg: &InboundMessage,
    ) -> Result<(), ArchivistError> {
        let Some(owner) = self.store.owner(owner_id).await? else {
            return Ok(());
        };
        if !owner.is_active() {
            return Ok(());
        }
        let conversation = msg.chat.conversation_id();
        let Some(group) = owner.group(conversation) else {
            debug!(owner = %owner_id, conversation, "group not configured");
            return Ok(());
        };
        if !group.policy.applied_to(msg).any() {
            return Ok(());
        }
        let sender = match msg.sender_id {
            Some(id) => match self
                .dispatcher
                .call(owner_id, || client.resolve_user(id))
                .await
            {
                Ok(profile) => profile,
                Err(e) if must_propagate(&e) => return Err(e),
                Err(_) => None,
            },
            None => None,
        };
        if sender.as_ref().is_some_and(|s| s.is_bot) {
            return Ok(());
        }

        let Some((_claim, items)) = self.batch(owner_id, client, msg).await? else {
            return Ok(());
        };
        let dest = self
            .provisioner
            .group_destination(owner_id, client, group)
            .await?;
        let ids: Vec<i32> = items.iter().map(|m| m.id).collect();
        let reply_to = items.first().and_then(|m| m.reply_to);
        let forwarded = self
            .forward_threaded(owner_id, client, msg.chat, &ids, dest.peer(), reply_to)
            .await?;
        if forwarded.is_some() {
            for _ in &items {
                record_archived(DeliveryMode::Forwarded);
            }
        } else {
            let sender_name = sender
                .as_ref()
                .map(UserProfile::display_name)
                .unwrap_or_else(|| "Unknown".into());
            for item in &items {
                self.reconstruct_group(owner_id, client, group, &dest, &sender_name, item)
                    .await?;
            }
        }
        info!(owner = %owner_id, conversation, count = items.len(), "group message archived");
        Ok(())
    }

    async fn reconstruct_group(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        group: &GroupArchive,
        dest: &Destination,
        sender_name: &str,
        message: &InboundMessage,
    ) -> Result<(), ArchivistError> {
        let conversation = message.chat.conversation_id();
        let anchor = message
            .reply_to
            .and_then(|parent| self.replies.get(owner, conversation, parent));
        let text = format::group_metadata(sender_name, &group.title, message);
        let peer = dest.peer();
        match self
            .dispatcher
            .call(owner, || client.send_text(peer, &text, anchor))
            .await
        {
            Ok(id) => {
                self.replies.record(owner, conversation, message.id, id);
                record_archived(DeliveryMode::Reconstructed);
                Ok(())
            }
            Err(e) if must_propagate(&e) => Err(e),
            Err(e) => {
                warn!(
                    owner = %owner,
                    message_id = message.id,
                    error = %e,
                    "group metadata not delivered"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MessageHandler for ArchivePipeline {
    async fn on_event(
        &self,
        owner: UserId,
        client: Arc<dyn PlatformClient>,
        msg: InboundMessage,
    ) -> Result<(), ArchivistError> {
        let client = client.as_ref();
        match msg.chat {
            ChatRef::User(contact) => self.archive_private(owner, client, contact, &msg).await,
            ChatRef::BasicGroup(_) | ChatRef::Channel(_) => {
                self.archive_group(owner, client, &msg).await
            }
        }
    }
}
