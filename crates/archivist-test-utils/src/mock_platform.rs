// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted in-memory platform connection.
//!
//! `MockPlatform` implements `PlatformClient` on top of a small simulated
//! account: channels with their messages, saved messages, folders, and a
//! user directory. Every outbound call is recorded, and failures can be
//! queued per method with [`MockPlatform::fail_next`].

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use archivist_core::types::{
    ChannelHandle, ChannelInfo, ChannelSummary, ChatRef, DialogFolder, InboundMessage, Peer, UserId,
    UserProfile,
};
use archivist_core::{PlatformClient, PlatformError};

/// What a recorded outbound message was.
#[derive(Debug, Clone, PartialEq)]
pub enum SentKind {
    Forward { from: ChatRef, source_id: i32 },
    Text(String),
    File { file_name: String, caption: String },
}

/// A message that landed in a channel or in saved messages.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub id: i32,
    pub peer: Peer,
    pub kind: SentKind,
    pub reply_to: Option<i32>,
}

impl SentMessage {
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            SentKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match &self.kind {
            SentKind::File { caption, .. } => Some(caption),
            _ => None,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.kind, SentKind::Forward { .. })
    }
}

/// A simulated channel.
#[derive(Debug, Clone)]
pub struct MockChannelState {
    pub title: String,
    pub about: String,
    pub access_hash: i64,
    pub left: bool,
    pub joins: u32,
}

#[derive(Debug, Clone)]
pub struct MockFolder {
    pub folder: DialogFolder,
    pub emoticon: String,
    pub channels: Vec<i64>,
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, UserProfile>,
    channels: HashMap<i64, MockChannelState>,
    sent: Vec<SentMessage>,
    folders: Vec<MockFolder>,
    history: HashMap<ChatRef, Vec<InboundMessage>>,
    failures: HashMap<&'static str, VecDeque<PlatformError>>,
    calls: Vec<&'static str>,
    download_payload: Option<Vec<u8>>,
}

/// A mock platform connection for one account.
pub struct MockPlatform {
    me: UserProfile,
    state: Mutex<State>,
    inbound: Mutex<VecDeque<Result<InboundMessage, PlatformError>>>,
    inbound_ready: Notify,
    closed: AtomicBool,
    logged_out: AtomicBool,
    disconnected: AtomicBool,
    drop_anchored_forwards: AtomicBool,
    next_message_id: AtomicI32,
    next_channel_id: AtomicI64,
}

impl MockPlatform {
    /// A connection authenticated as `me`.
    pub fn new(me: UserProfile) -> Self {
        Self {
            me,
            state: Mutex::new(State::default()),
            inbound: Mutex::new(VecDeque::new()),
            inbound_ready: Notify::new(),
            closed: AtomicBool::new(false),
            logged_out: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            drop_anchored_forwards: AtomicBool::new(false),
            next_message_id: AtomicI32::new(1000),
            next_channel_id: AtomicI64::new(5000),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn enter(&self, method: &'static str) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.calls.push(method);
        match state.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    // --- scripting ---

    /// Queues an error for the next call to `method` (e.g. `"forward_messages"`).
    pub fn fail_next(&self, method: &'static str, err: PlatformError) {
        self.state()
            .failures
            .entry(method)
            .or_default()
            .push_back(err);
    }

    pub fn add_user(&self, profile: UserProfile) {
        self.state().users.insert(profile.id, profile);
    }

    /// Delivers an inbound message to the update stream.
    pub fn push_message(&self, msg: InboundMessage) {
        self.inbound
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(Ok(msg));
        self.inbound_ready.notify_one();
    }

    /// Delivers an error to the update stream.
    pub fn push_stream_error(&self, err: PlatformError) {
        self.inbound
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(Err(err));
        self.inbound_ready.notify_one();
    }

    /// Ends the update stream once queued items are drained.
    pub fn close_stream(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.inbound_ready.notify_one();
    }

    /// History returned by `recent_messages`, newest first.
    pub fn set_history(&self, chat: ChatRef, messages: Vec<InboundMessage>) {
        self.state().history.insert(chat, messages);
    }

    /// Bytes written by `download_media`. Empty simulates a zero-size download.
    pub fn set_download_payload(&self, payload: Vec<u8>) {
        self.state().download_payload = Some(payload);
    }

    /// Anchored forwards succeed but return no ids.
    pub fn drop_anchored_forwards(&self, drop: bool) {
        self.drop_anchored_forwards.store(drop, Ordering::SeqCst);
    }

    /// Adds an existing channel to the simulated account.
    pub fn add_channel(&self, title: &str) -> ChannelHandle {
        let id = self.next_channel_id.fetch_add(1, Ordering::SeqCst);
        let handle = ChannelHandle {
            id,
            access_hash: id * 7,
        };
        self.state().channels.insert(
            id,
            MockChannelState {
                title: title.to_string(),
                about: String::new(),
                access_hash: handle.access_hash,
                left: false,
                joins: 0,
            },
        );
        handle
    }

    pub fn remove_channel(&self, id: i64) {
        self.state().channels.remove(&id);
    }

    pub fn leave_channel(&self, id: i64) {
        if let Some(ch) = self.state().channels.get_mut(&id) {
            ch.left = true;
        }
    }

    pub fn rotate_access_hash(&self, id: i64, access_hash: i64) {
        if let Some(ch) = self.state().channels.get_mut(&id) {
            ch.access_hash = access_hash;
        }
    }

    // --- inspection ---

    pub fn me(&self) -> &UserProfile {
        &self.me
    }

    pub fn channels(&self) -> HashMap<i64, MockChannelState> {
        self.state().channels.clone()
    }

    pub fn channel(&self, id: i64) -> Option<MockChannelState> {
        self.state().channels.get(&id).cloned()
    }

    pub fn folders(&self) -> Vec<MockFolder> {
        self.state().folders.clone()
    }

    /// Everything currently present at `peer`, oldest first.
    pub fn sent_to(&self, peer: Peer) -> Vec<SentMessage> {
        self.state()
            .sent
            .iter()
            .filter(|m| same_peer(&m.peer, &peer))
            .cloned()
            .collect()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == method).count()
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn record(&self, peer: Peer, kind: SentKind, reply_to: Option<i32>) -> i32 {
        let id = self.next_id();
        self.state().sent.push(SentMessage {
            id,
            peer,
            kind,
            reply_to,
        });
        id
    }

    fn check_peer(&self, peer: &Peer) -> Result<(), PlatformError> {
        match peer {
            Peer::SavedMessages => Ok(()),
            Peer::Channel(handle) => match self.state().channels.get(&handle.id) {
                None => Err(PlatformError::ChannelGone {
                    reason: "CHANNEL_INVALID".into(),
                }),
                Some(ch) if ch.access_hash != handle.access_hash => {
                    Err(PlatformError::AccessHashInvalid)
                }
                Some(_) => Ok(()),
            },
        }
    }
}

/// Channel peers compare by id only; access hashes rotate.
fn same_peer(a: &Peer, b: &Peer) -> bool {
    match (a, b) {
        (Peer::SavedMessages, Peer::SavedMessages) => true,
        (Peer::Channel(x), Peer::Channel(y)) => x.id == y.id,
        _ => false,
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn get_me(&self) -> Result<UserProfile, PlatformError> {
        self.enter("get_me")?;
        Ok(self.me.clone())
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, PlatformError> {
        loop {
            let next = self
                .inbound
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .pop_front();
            match next {
                Some(Ok(msg)) => return Ok(Some(msg)),
                Some(Err(err)) => return Err(err),
                None if self.closed.load(Ordering::SeqCst) => return Ok(None),
                None => self.inbound_ready.notified().await,
            }
        }
    }

    async fn resolve_user(&self, id: UserId) -> Result<Option<UserProfile>, PlatformError> {
        self.enter("resolve_user")?;
        Ok(self.state().users.get(&id).cloned())
    }

    async fn forward_messages(
        &self,
        from: ChatRef,
        ids: &[i32],
        to: Peer,
        reply_to: Option<i32>,
    ) -> Result<Vec<i32>, PlatformError> {
        self.enter("forward_messages")?;
        self.check_peer(&to)?;
        if reply_to.is_some() && self.drop_anchored_forwards.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(ids
            .iter()
            .map(|source_id| {
                self.record(
                    to,
                    SentKind::Forward {
                        from,
                        source_id: *source_id,
                    },
                    reply_to,
                )
            })
            .collect())
    }

    async fn send_text(
        &self,
        to: Peer,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError> {
        self.enter("send_text")?;
        self.check_peer(&to)?;
        Ok(self.record(to, SentKind::Text(text.to_string()), reply_to))
    }

    async fn send_file(
        &self,
        to: Peer,
        path: &Path,
        caption: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError> {
        self.enter("send_file")?;
        self.check_peer(&to)?;
        if tokio::fs::metadata(path).await.is_err() {
            return Err(PlatformError::Transport(format!(
                "upload source missing: {}",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.record(
            to,
            SentKind::File {
                file_name,
                caption: caption.to_string(),
            },
            reply_to,
        ))
    }

    async fn download_media(
        &self,
        _chat: ChatRef,
        message_id: i32,
        dest: &Path,
    ) -> Result<u64, PlatformError> {
        self.enter("download_media")?;
        let payload = self
            .state()
            .download_payload
            .clone()
            .unwrap_or_else(|| format!("media-{message_id}").into_bytes());
        tokio::fs::write(dest, &payload)
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        Ok(payload.len() as u64)
    }

    async fn delete_messages(&self, peer: Peer, ids: &[i32]) -> Result<(), PlatformError> {
        self.enter("delete_messages")?;
        self.state()
            .sent
            .retain(|m| !(same_peer(&m.peer, &peer) && ids.contains(&m.id)));
        Ok(())
    }

    async fn create_channel(
        &self,
        title: &str,
        about: &str,
    ) -> Result<ChannelHandle, PlatformError> {
        self.enter("create_channel")?;
        let handle = self.add_channel(title);
        if let Some(ch) = self.state().channels.get_mut(&handle.id) {
            ch.about = about.to_string();
        }
        Ok(handle)
    }

    async fn get_channel(&self, channel: ChannelHandle) -> Result<ChannelInfo, PlatformError> {
        self.enter("get_channel")?;
        match self.state().channels.get(&channel.id) {
            Some(ch) => Ok(ChannelInfo {
                left: ch.left,
                access_hash: ch.access_hash,
            }),
            None => Err(PlatformError::ChannelGone {
                reason: "CHANNEL_INVALID".into(),
            }),
        }
    }

    async fn join_channel(&self, channel: ChannelHandle) -> Result<(), PlatformError> {
        self.enter("join_channel")?;
        match self.state().channels.get_mut(&channel.id) {
            Some(ch) => {
                ch.left = false;
                ch.joins += 1;
                Ok(())
            }
            None => Err(PlatformError::ChannelGone {
                reason: "CHANNEL_INVALID".into(),
            }),
        }
    }

    async fn list_channels(&self, limit: u32) -> Result<Vec<ChannelSummary>, PlatformError> {
        self.enter("list_channels")?;
        let state = self.state();
        let mut ids: Vec<&i64> = state.channels.keys().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .take(limit as usize)
            .filter_map(|id| {
                state.channels.get(id).map(|ch| ChannelSummary {
                    handle: ChannelHandle {
                        id: *id,
                        access_hash: ch.access_hash,
                    },
                    title: ch.title.clone(),
                    broadcast: true,
                })
            })
            .collect())
    }

    async fn list_folders(&self) -> Result<Vec<DialogFolder>, PlatformError> {
        self.enter("list_folders")?;
        Ok(self
            .state()
            .folders
            .iter()
            .map(|f| f.folder.clone())
            .collect())
    }

    async fn create_folder(
        &self,
        id: i32,
        title: &str,
        emoticon: &str,
        channels: &[ChannelHandle],
    ) -> Result<(), PlatformError> {
        self.enter("create_folder")?;
        let mut state = self.state();
        if state.folders.iter().any(|f| f.folder.id == id) {
            return Err(PlatformError::Rpc {
                code: 400,
                message: "FILTER_ID_INVALID".into(),
            });
        }
        state.folders.push(MockFolder {
            folder: DialogFolder {
                id,
                title: title.to_string(),
            },
            emoticon: emoticon.to_string(),
            channels: channels.iter().map(|c| c.id).collect(),
        });
        Ok(())
    }

    async fn add_to_folder(
        &self,
        folder_id: i32,
        channel: ChannelHandle,
    ) -> Result<(), PlatformError> {
        self.enter("add_to_folder")?;
        let mut state = self.state();
        match state.folders.iter_mut().find(|f| f.folder.id == folder_id) {
            Some(folder) => {
                if !folder.channels.contains(&channel.id) {
                    folder.channels.push(channel.id);
                }
                Ok(())
            }
            None => Err(PlatformError::Rpc {
                code: 400,
                message: "FILTER_ID_INVALID".into(),
            }),
        }
    }

    async fn recent_messages(
        &self,
        chat: ChatRef,
        limit: u32,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        self.enter("recent_messages")?;
        Ok(self
            .state()
            .history
            .get(&chat)
            .map(|h| h.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn log_out(&self) -> Result<(), PlatformError> {
        self.enter("log_out")?;
        self.logged_out.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        self.enter("disconnect")?;
        self.disconnected.store(true, Ordering::SeqCst);
        self.close_stream();
        Ok(())
    }
}
