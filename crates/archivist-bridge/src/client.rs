// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One connected sidecar session, exposed as a [`PlatformClient`].

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Body, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use archivist_core::types::{
    ChannelHandle, ChannelInfo, ChannelSummary, ChatRef, DialogFolder, InboundMessage, Peer, UserId,
    UserProfile,
};
use archivist_core::{PlatformClient, PlatformError};

use crate::http::{BridgeHttp, check_status, open_envelope, transport};
use crate::wire::{Envelope, Uploaded};

/// A live session on the sidecar, addressed by `client_id`.
pub struct BridgeClient {
    http: BridgeHttp,
    client_id: String,
    poll: Duration,
    pending: Mutex<VecDeque<InboundMessage>>,
}

impl BridgeClient {
    pub(crate) fn new(http: BridgeHttp, client_id: String, poll: Duration) -> Self {
        Self {
            http,
            client_id,
            poll,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn session_path(&self, suffix: &str) -> String {
        format!("/v1/sessions/{}{suffix}", self.client_id)
    }

    async fn rpc<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, PlatformError> {
        trace!(client_id = %self.client_id, method, "rpc");
        let response = self
            .http
            .client()
            .post(self.http.url(&self.session_path(&format!("/rpc/{method}"))))
            .json(&params)
            .send()
            .await
            .map_err(transport)?;
        let envelope: Envelope<Value> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        open_envelope(envelope)
    }

    /// Streams a local file to the sidecar and returns its upload handle.
    async fn upload(&self, path: &Path) -> Result<String, PlatformError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            PlatformError::Transport(format!("cannot open {}: {e}", path.display()))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let response = self
            .http
            .client()
            .post(self.http.url(&self.session_path("/upload")))
            .header("x-file-name", name)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(transport)?;
        let envelope: Envelope<Value> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        let uploaded: Uploaded = open_envelope(envelope)?;
        Ok(uploaded.file_id)
    }

    /// Long-polls the update endpoint. `None` once the sidecar reports the
    /// session as gone.
    async fn poll_updates(&self) -> Result<Option<Vec<InboundMessage>>, PlatformError> {
        let response = self
            .http
            .client()
            .get(self.http.url(&self.session_path(&format!(
                "/updates?timeout={}",
                self.poll.as_secs()
            ))))
            .timeout(self.poll + Duration::from_secs(10))
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(Some(Vec::new())),
            Err(e) => return Err(transport(e)),
        };
        if matches!(response.status(), StatusCode::GONE | StatusCode::NOT_FOUND) {
            debug!(client_id = %self.client_id, "update stream closed by sidecar");
            return Ok(None);
        }
        let envelope: Envelope<Value> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        open_envelope(envelope).map(Some)
    }
}

#[async_trait]
impl PlatformClient for BridgeClient {
    async fn get_me(&self) -> Result<UserProfile, PlatformError> {
        self.rpc("get_me", json!({})).await
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, PlatformError> {
        let mut pending = self.pending.lock().await;
        loop {
            if let Some(msg) = pending.pop_front() {
                return Ok(Some(msg));
            }
            match self.poll_updates().await? {
                Some(batch) => pending.extend(batch),
                None => return Ok(None),
            }
        }
    }

    async fn resolve_user(&self, id: UserId) -> Result<Option<UserProfile>, PlatformError> {
        self.rpc("resolve_user", json!({ "user_id": id })).await
    }

    async fn forward_messages(
        &self,
        from: ChatRef,
        ids: &[i32],
        to: Peer,
        reply_to: Option<i32>,
    ) -> Result<Vec<i32>, PlatformError> {
        self.rpc(
            "forward_messages",
            json!({ "from": from, "ids": ids, "to": to, "reply_to": reply_to }),
        )
        .await
    }

    async fn send_text(
        &self,
        to: Peer,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError> {
        self.rpc(
            "send_text",
            json!({ "to": to, "text": text, "reply_to": reply_to }),
        )
        .await
    }

    async fn send_file(
        &self,
        to: Peer,
        path: &Path,
        caption: &str,
        reply_to: Option<i32>,
    ) -> Result<i32, PlatformError> {
        let file_id = self.upload(path).await?;
        self.rpc(
            "send_file",
            json!({ "to": to, "file_id": file_id, "caption": caption, "reply_to": reply_to }),
        )
        .await
    }

    async fn download_media(
        &self,
        chat: ChatRef,
        message_id: i32,
        dest: &Path,
    ) -> Result<u64, PlatformError> {
        let response = self
            .http
            .client()
            .post(self.http.url(&self.session_path("/download")))
            .json(&json!({ "chat": chat, "message_id": message_id }))
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;

        let io_err = |e: std::io::Error| {
            PlatformError::Transport(format!("writing {}: {e}", dest.display()))
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        Ok(written)
    }

    async fn delete_messages(&self, peer: Peer, ids: &[i32]) -> Result<(), PlatformError> {
        self.rpc("delete_messages", json!({ "peer": peer, "ids": ids }))
            .await
    }

    async fn create_channel(
        &self,
        title: &str,
        about: &str,
    ) -> Result<ChannelHandle, PlatformError> {
        self.rpc("create_channel", json!({ "title": title, "about": about }))
            .await
    }

    async fn get_channel(&self, channel: ChannelHandle) -> Result<ChannelInfo, PlatformError> {
        self.rpc("get_channel", json!({ "channel": channel })).await
    }

    async fn join_channel(&self, channel: ChannelHandle) -> Result<(), PlatformError> {
        self.rpc("join_channel", json!({ "channel": channel })).await
    }

    async fn list_channels(&self, limit: u32) -> Result<Vec<ChannelSummary>, PlatformError> {
        self.rpc("list_channels", json!({ "limit": limit })).await
    }

    async fn list_folders(&self) -> Result<Vec<DialogFolder>, PlatformError> {
        self.rpc("list_folders", json!({})).await
    }

    async fn create_folder(
        &self,
        id: i32,
        title: &str,
        emoticon: &str,
        channels: &[ChannelHandle],
    ) -> Result<(), PlatformError> {
        self.rpc(
            "create_folder",
            json!({ "id": id, "title": title, "emoticon": emoticon, "channels": channels }),
        )
        .await
    }

    async fn add_to_folder(
        &self,
        folder_id: i32,
        channel: ChannelHandle,
    ) -> Result<(), PlatformError> {
        self.rpc(
            "add_to_folder",
            json!({ "folder_id": folder_id, "channel": channel }),
        )
        .await
    }

    async fn recent_messages(
        &self,
        chat: ChatRef,
        limit: u32,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        self.rpc("recent_messages", json!({ "chat": chat, "limit": limit }))
            .await
    }

    async fn log_out(&self) -> Result<(), PlatformError> {
        self.rpc("log_out", json!({})).await
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        let response = self
            .http
            .client()
            .delete(self.http.url(&self.session_path("")))
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        debug!(client_id = %self.client_id, "sidecar session closed");
        Ok(())
    }
}
