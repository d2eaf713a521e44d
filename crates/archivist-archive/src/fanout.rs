// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monitoring fan-out: mirrors archived private messages to every parent
//! holding an active monitoring link.
//!
//! A parent with a live session gets a folder per monitored owner and a
//! channel per contact inside their own account. A parent without one gets
//! a single control-surface notice. Nothing here is retried or surfaced to
//! the caller.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use archivist_core::types::{Direction, InboundMessage, OwnerRecord, Peer, UserProfile};
use archivist_core::{
    ArchiveStore, ArchivistError, ControlSurface, PlatformClient, SessionRegistry, UserId,
};
use archivist_prometheus::record_fanout;
use archivist_resilience::Dispatcher;

use crate::format;
use crate::media::{MediaStore, ScratchFile};
use crate::provisioner::{FolderPurpose, MONITORING_FALLBACK_FOLDER, Provisioner};

/// One archived message, as seen by the fan-out.
pub struct ArchivedMessage<'a> {
    pub owner: &'a OwnerRecord,
    pub contact: &'a UserProfile,
    pub message: &'a InboundMessage,
    /// Already-downloaded media, reused instead of downloading again.
    pub scratch: Option<&'a ScratchFile>,
}

impl ArchivedMessage<'_> {
    fn direction(&self) -> Direction {
        Direction::from_outgoing(self.message.outgoing)
    }

    fn child_name(&self) -> String {
        self.owner
            .first_name
            .clone()
            .or_else(|| self.owner.username.clone())
            .unwrap_or_else(|| format!("Child_{}", self.owner.id))
    }
}

pub struct MonitoringFanout {
    store: Arc<dyn ArchiveStore>,
    registry: Arc<SessionRegistry>,
    control: Arc<dyn ControlSurface>,
    dispatcher: Arc<Dispatcher>,
    provisioner: Arc<Provisioner>,
    media: MediaStore,
}

impl MonitoringFanout {
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        registry: Arc<SessionRegistry>,
        control: Arc<dyn ControlSurface>,
        dispatcher: Arc<Dispatcher>,
        provisioner: Arc<Provisioner>,
        media: MediaStore,
    ) -> Self {
        Self {
            store,
            registry,
            control,
            dispatcher,
            provisioner,
            media,
        }
    }

    /// Delivers `archived` to every currently active parent of its owner.
    pub async fn on_archived(
        &self,
        owner_client: &dyn PlatformClient,
        archived: &ArchivedMessage<'_>,
    ) {
        let owner = archived.owner.id;
        let links = match self.store.monitoring_links(owner).await {
            Ok(links) => links,
            Err(e) => {
                warn!(owner = %owner, error = %e, "monitoring links unavailable");
                return;
            }
        };
        let now = Utc::now();
        for link in links.iter().filter(|l| l.is_active_at(now)) {
            let parent = link.parent_id;
            let delivered = match self.registry.get(parent) {
                Some(parent_client) => {
                    match self
                        .deliver_live(parent, parent_client.as_ref(), owner_client, archived)
                        .await
                    {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(
                                owner = %owner,
                                parent = %parent,
                                error = %e,
                                "live monitoring delivery failed, notifying instead"
                            );
                            self.provisioner
                                .forget_monitoring_channel(parent, archived.contact.id);
                            false
                        }
                    }
                }
                None => {
                    debug!(owner = %owner, parent = %parent, "parent offline");
                    false
                }
            };
            if delivered {
                record_fanout("live");
            } else {
                self.notify(parent, archived).await;
            }
        }
    }

    async fn deliver_live(
        &self,
        parent: UserId,
        parent_client: &dyn PlatformClient,
        owner_client: &dyn PlatformClient,
        archived: &ArchivedMessage<'_>,
    ) -> Result<(), ArchivistError> {
        let child = archived.child_name();
        let contact_name = archived.contact.display_name();
        let folder = self
            .provisioner
            .folder(
                parent,
                parent_client,
                FolderPurpose::Monitoring {
                    child: archived.owner.id,
                },
                &child,
            )
            .await?
            .unwrap_or(MONITORING_FALLBACK_FOLDER);
        let contact_id = archived.contact.id;
        let channel = self
            .provisioner
            .monitoring_channel(parent, parent_client, folder, contact_id, &contact_name)
            .await?;
        let peer = Peer::Channel(channel);
        let msg = archived.message;
        let text = format::monitoring_metadata(archived.direction(), &child, &contact_name, msg);

        if msg.has_media() {
            let sent = match archived.scratch {
                Some(file) => {
                    self.send_file(parent, parent_client, peer, file, &text)
                        .await
                }
                None => {
                    let owner = archived.owner.id;
                    match self.media.download(owner, owner_client, msg).await {
                        Ok(file) => {
                            let sent = self
                                .send_file(parent, parent_client, peer, &file, &text)
                                .await;
                            file.discard().await;
                            sent
                        }
                        Err(e) => Err(e),
                    }
                }
            };
            if let Err(e) = sent {
                warn!(
                    parent = %parent,
                    message_id = msg.id,
                    error = %e,
                    "monitoring media not sent"
                );
                let text = format!("{text}\n\n{}", format::MEDIA_FAILED);
                self.dispatcher
                    .call(parent, || parent_client.send_text(peer, &text, None))
                    .await?;
            }
        } else if msg.has_text() {
            self.dispatcher
                .call(parent, || parent_client.send_text(peer, &text, None))
                .await?;
        }
        info!(
            owner = %archived.owner.id,
            parent = %parent,
            message_id = msg.id,
            "mirrored to monitoring channel"
        );
        Ok(())
    }

    async fn send_file(
        &self,
        parent: UserId,
        parent_client: &dyn PlatformClient,
        peer: Peer,
        file: &ScratchFile,
        caption: &str,
    ) -> Result<(), ArchivistError> {
        self.dispatcher
            .call(parent, || {
                parent_client.send_file(peer, file.path(), caption, None)
            })
            .await?;
        Ok(())
    }

    async fn notify(&self, parent: UserId, archived: &ArchivedMessage<'_>) {
        let child = self
            .control
            .display_name(archived.owner.id)
            .await
            .unwrap_or_else(|| archived.child_name());
        let text = format::monitoring_alert(
            archived.direction(),
            &child,
            &archived.contact.display_name(),
            archived.message,
        );
        self.control.notify(parent, &text).await;
        record_fanout("fallback");
    }
}
