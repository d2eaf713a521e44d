// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Revocation-watching decorator around a platform connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::error;

use archivist_core::types::{
    ChannelHandle, ChannelInfo, ChannelSummary, ChatRef, DialogFolder, InboundMessage, Peer,
    UserProfile,
};
use archivist_core::{PlatformClient, PlatformError, UserId};

use crate::supervisor::LOGGED_OUT;

/// A session that must be torn down, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub owner: UserId,
    pub reason: String,
}

/// Forwards every call to the wrapped client and reports revocation
/// signatures (and explicit log-outs) to the supervisor.
pub struct GuardedClient {
    owner: UserId,
    inner: Arc<dyn PlatformClient>,
    ended: mpsc::UnboundedSender<SessionEnd>,
}

impl GuardedClient {
    pub fn new(
        owner: UserId,
        inner: Arc<dyn PlatformClient>,
        ended: mpsc::UnboundedSender<SessionEnd>,
    ) -> Self {
        Self {
            owner,
            inner,
            ended,
        }
    }

    fn report(&self, reason: &str) {
        let _ = self.ended.send(SessionEnd {
            owner: self.owner,
            reason: reason.to_string(),
        });
    }

    fn watch<T>(&self, result: Result<T, PlatformError>) -> Result<T, PlatformError> {
        if let Err(e) = &result
            && let Some(reason) = e.revocation_reason()
        {
            error!(owner = %self.owner, reason, "session invalidated by the platform");
            self.report(reason);
        }
        result
    }
}

#[async_trait]
impl PlatformClient for GuardedClient {
    async fn get_me(&self) -> Result<UserProfile, PlatformError> {
        self.watch(self.inner.get_me().await)
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, PlatformError> {
        self.watch(self.inner.next_message().await)
    }

    async fn resolve_user(&self, id: UserId) -> Result<Option<UserProfile>, PlatformError> {
        self.watch(self.inner.resolve_user(id).await)
    }

    async fn forward_messages(
        &self,
        from: ChatRef,
        ids: &[i32],
        to: Peer,
        reply_to: Option<i32>,
    ) -> Result<Vec<i32>, PlatformError> {
        self.watch(self.inner.forward_messages(from, ids, to, reply_to).await)
    }

    async fn send_text(
        &self,
        to: Peer,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError> {
        self.watch(self.inner.send_text(to, text, reply_to).await)
    }

    async fn send_file(
        &self,
        to: Peer,
        path: &Path,
        caption: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError> {
        self.watch(self.inner.send_file(to, path, caption, reply_to).await)
    }

    async fn download_media(
        &self,
        chat: ChatRef,
        message_id: i32,
        dest: &Path,
    ) -> Result<u64, PlatformError> {
        self.watch(self.inner.download_media(chat, message_id, dest).await)
    }

    async fn delete_messages(&self, peer: Peer, ids: &[i32]) -> Result<(), PlatformError> {
        self.watch(self.inner.delete_messages(peer, ids).await)
    }

    async fn create_channel(
        &self,
        title: &str,
        about: &str,
    ) -> Result<ChannelHandle, PlatformError> {
        self.watch(self.inner.create_channel(title, about).await)
    }

    async fn get_channel(&self, channel: ChannelHandle) -> Result<ChannelInfo, PlatformError> {
        self.watch(self.inner.get_channel(channel).await)
    }

    async fn join_channel(&self, channel: ChannelHandle) -> Result<(), PlatformError> {
        self.watch(self.inner.join_channel(channel).await)
    }

    async fn list_channels(&self, limit: u32) -> Result<Vec<ChannelSummary>, PlatformError> {
        self.watch(self.inner.list_channels(limit).await)
    }

    async fn list_folders(&self) -> Result<Vec<DialogFolder>, PlatformError> {
        self.watch(self.inner.list_folders().await)
    }

    async fn create_folder(
        &self,
        id: i32,
        title: &str,
        emoticon: &str,
        channels: &[ChannelHandle],
    ) -> Result<(), PlatformError> {
        self.watch(self.inner.create_folder(id, title, emoticon, channels).await)
    }

    async fn add_to_folder(
        &self,
        folder_id: i32,
        channel: ChannelHandle,
    ) -> Result<(), PlatformError> {
        self.watch(self.inner.add_to_folder(folder_id, channel).await)
    }

    async fn recent_messages(
        &self,
        chat: ChatRef,
        limit: u32,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        self.watch(self.inner.recent_messages(chat, limit).await)
    }

    async fn log_out(&self) -> Result<(), PlatformError> {
        let result = self.watch(self.inner.log_out().await);
        if !matches!(&result, Err(e) if e.is_revocation()) {
            self.report(LOGGED_OUT);
        }
        result
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        self.inner.disconnect().await
    }
}
