// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging-platform seams: the per-session client, the connector that
//! opens sessions and runs the login handshake, and the prompt callbacks the
//! handshake suspends on.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::{ArchivistError, PlatformError};
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelHandle, ChannelInfo, ChannelSummary, ChatRef, DialogFolder, InboundMessage, Peer, UserId,
    UserProfile,
};

/// One live, authenticated connection to the platform.
///
/// Every method is a single platform call. Errors are already classified
/// into [`PlatformError`] so callers can react to throttling and revocation.
#[async_trait]
pub trait PlatformClient: Send + Sync + 'static {
    /// The account this connection is authenticated as.
    async fn get_me(&self) -> Result<UserProfile, PlatformError>;

    /// Waits for the next message event. `None` means the update stream ended.
    async fn next_message(&self) -> Result<Option<InboundMessage>, PlatformError>;

    /// Looks up a user's profile. `None` if the platform cannot resolve it.
    async fn resolve_user(&self, id: UserId) -> Result<Option<UserProfile>, PlatformError>;

    /// Forwards `ids` from `from` to `to`, optionally as replies to `reply_to`
    /// in the destination. Returns the new message ids in order.
    async fn forward_messages(
        &self,
        from: ChatRef,
        ids: &[i32],
        to: Peer,
        reply_to: Option<i32>,
    ) -> Result<Vec<i32>, PlatformError>;

    /// Sends a text message; returns its id.
    async fn send_text(
        &self,
        to: Peer,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError>;

    /// Uploads a local file with a caption; returns the message id.
    async fn send_file(
        &self,
        to: Peer,
        path: &Path,
        caption: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError>;

    /// Downloads the media of a message into `dest`; returns bytes written.
    async fn download_media(
        &self,
        chat: ChatRef,
        message_id: i32,
        dest: &Path,
    ) -> Result<u64, PlatformError>;

    async fn delete_messages(&self, peer: Peer, ids: &[i32]) -> Result<(), PlatformError>;

    /// Creates a broadcast channel owned by this account.
    async fn create_channel(&self, title: &str, about: &str)
    -> Result<ChannelHandle, PlatformError>;

    /// Looks up the owner's membership and the current access hash.
    async fn get_channel(&self, channel: ChannelHandle) -> Result<ChannelInfo, PlatformError>;

    async fn join_channel(&self, channel: ChannelHandle) -> Result<(), PlatformError>;

    /// Channels in the account's recent dialogs.
    async fn list_channels(&self, limit: u32) -> Result<Vec<ChannelSummary>, PlatformError>;

    async fn list_folders(&self) -> Result<Vec<DialogFolder>, PlatformError>;

    /// Creates a folder in slot `id` holding `channels`.
    async fn create_folder(
        &self,
        id: i32,
        title: &str,
        emoticon: &str,
        channels: &[ChannelHandle],
    ) -> Result<(), PlatformError>;

    async fn add_to_folder(&self, folder_id: i32, channel: ChannelHandle)
    -> Result<(), PlatformError>;

    /// The most recent messages of a conversation, newest first.
    async fn recent_messages(
        &self,
        chat: ChatRef,
        limit: u32,
    ) -> Result<Vec<InboundMessage>, PlatformError>;

    /// Terminates this authorization on the platform side.
    async fn log_out(&self) -> Result<(), PlatformError>;

    /// Closes the network connection. The credential stays valid.
    async fn disconnect(&self) -> Result<(), PlatformError>;
}

/// Result of a completed login handshake.
#[derive(Debug)]
pub struct AuthenticatedAccount {
    pub profile: UserProfile,
    /// Opaque reusable session token.
    pub session: SecretString,
}

/// The three values a login handshake asks for, in order. Each call may
/// suspend for as long as it takes a human to answer.
#[async_trait]
pub trait LoginPrompts: Send + Sync {
    async fn phone(&self) -> Result<String, ArchivistError>;

    async fn code(&self) -> Result<String, ArchivistError>;

    /// Asked only when two-step verification is enabled.
    async fn password(&self, hint: Option<String>) -> Result<String, ArchivistError>;
}

/// Opens platform sessions.
#[async_trait]
pub trait PlatformConnector: PluginAdapter {
    /// Opens a connection using a stored session token.
    async fn connect(&self, session: &SecretString)
    -> Result<Arc<dyn PlatformClient>, PlatformError>;

    /// Drives the platform's login handshake, pulling each value from `prompts`.
    async fn authenticate(
        &self,
        prompts: &dyn LoginPrompts,
    ) -> Result<AuthenticatedAccount, ArchivistError>;
}
