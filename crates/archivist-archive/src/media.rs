// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media download, scratch files, and retained copies.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use archivist_config::model::ArchiveConfig;
use archivist_core::types::{InboundMessage, MediaDescriptor, MediaInfo, MediaKind};
use archivist_core::{ArchivistError, PlatformClient, UserId};
use archivist_resilience::Dispatcher;

use crate::must_propagate;

/// File extension for downloaded media, without the dot.
pub fn extension_for(media: &MediaInfo) -> String {
    if media.kind == MediaKind::Photo {
        return "jpg".into();
    }
    if let Some(ext) = media
        .file_name
        .as_deref()
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
    {
        return ext.to_ascii_lowercase();
    }
    match media.kind {
        MediaKind::Video | MediaKind::RoundVideo => return "mp4".into(),
        MediaKind::Audio => return "mp3".into(),
        MediaKind::Voice => return "ogg".into(),
        _ => {}
    }
    let mime = media.mime_type.as_deref().unwrap_or_default();
    let ext = if mime.contains("video") {
        "mp4"
    } else if mime.contains("image") {
        "jpg"
    } else if mime.contains("audio") {
        "mp3"
    } else if mime.contains("pdf") {
        "pdf"
    } else {
        "bin"
    };
    ext.into()
}

/// A downloaded media file awaiting delivery. Call [`discard`](Self::discard)
/// once every consumer is done with it.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    size: u64,
    extension: String,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".into())
    }

    pub async fn discard(self) {
        remove_quietly(&self.path).await;
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "scratch file removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove scratch file"),
    }
}

/// Downloads media into the scratch directory and keeps durable copies.
#[derive(Clone)]
pub struct MediaStore {
    scratch_dir: PathBuf,
    retained_dir: PathBuf,
    attempts: u32,
    backoff: Duration,
    dispatcher: Arc<Dispatcher>,
}

impl MediaStore {
    pub fn new(config: &ArchiveConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            scratch_dir: PathBuf::from(&config.media_dir),
            retained_dir: PathBuf::from(&config.retained_dir),
            attempts: config.download_attempts.max(1),
            backoff: Duration::from_secs(config.download_backoff_secs),
            dispatcher,
        }
    }

    /// Downloads the media of `msg` through `owner`'s connection.
    ///
    /// Attempt `n` that fails waits `backoff × n` before the next one. A
    /// missing or empty file counts as a failed attempt. Throttle-exhaustion,
    /// revocation, and platform blocking end the loop at once.
    pub async fn download(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        msg: &InboundMessage,
    ) -> Result<ScratchFile, ArchivistError> {
        let extension = msg
            .media
            .as_ref()
            .map(extension_for)
            .ok_or_else(|| ArchivistError::NotFound(format!("message {} has no media", msg.id)))?;
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let mut last_err = ArchivistError::Internal("no download attempted".into());
        for attempt in 1..=self.attempts {
            let path = self
                .scratch_dir
                .join(format!("{}.{extension}", uuid::Uuid::new_v4()));
            match self.try_download(owner, client, msg, &path).await {
                Ok(size) => {
                    debug!(owner = %owner, message_id = msg.id, attempt, size, "media downloaded");
                    return Ok(ScratchFile {
                        path,
                        size,
                        extension,
                    });
                }
                Err(e) => {
                    remove_quietly(&path).await;
                    if must_propagate(&e) {
                        return Err(e);
                    }
                    warn!(
                        owner = %owner,
                        message_id = msg.id,
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        "media download attempt failed"
                    );
                    last_err = e;
                    if attempt < self.attempts {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn try_download(
        &self,
        owner: UserId,
        client: &dyn PlatformClient,
        msg: &InboundMessage,
        path: &Path,
    ) -> Result<u64, ArchivistError> {
        self.dispatcher
            .call(owner, || client.download_media(msg.chat, msg.id, path))
            .await?;
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArchivistError::Internal(format!(
                    "downloaded file not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Err(ArchivistError::Internal(format!(
                "downloaded file is empty: {}",
                path.display()
            )));
        }
        Ok(size)
    }

    /// Copies a scratch file to
    /// `<retained>/user_<owner>/contact_<contact>/msg_<id>_<millis>.<ext>`.
    pub async fn retain(
        &self,
        owner: UserId,
        contact: UserId,
        message_id: i32,
        file: &ScratchFile,
    ) -> Result<PathBuf, ArchivistError> {
        let dir = self
            .retained_dir
            .join(format!("user_{owner}"))
            .join(format!("contact_{contact}"));
        tokio::fs::create_dir_all(&dir).await?;
        let target = dir.join(format!(
            "msg_{message_id}_{}.{}",
            Utc::now().timestamp_millis(),
            file.extension
        ));
        tokio::fs::copy(&file.path, &target).await?;
        info!(owner = %owner, contact_id = %contact, path = %target.display(), "media retained");
        Ok(target)
    }

    /// Descriptor for an archive entry.
    pub fn describe(
        &self,
        msg: &InboundMessage,
        file: &ScratchFile,
        retained: Option<&Path>,
    ) -> MediaDescriptor {
        let media = msg.media.as_ref();
        MediaDescriptor {
            file_name: file.file_name(),
            size: file.size,
            mime_type: media
                .and_then(|m| m.mime_type.clone())
                .unwrap_or_else(|| "unknown".into()),
            ephemeral: media.is_some_and(MediaInfo::is_ephemeral),
            retained_path: retained.map(|p| p.display().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::PlatformError;
    use archivist_resilience::CircuitBreaker;
    use archivist_test_utils::MockPlatform;
    use archivist_test_utils::fixtures::{photo_message, profile};
    use tempfile::tempdir;

    fn media(kind: MediaKind, mime: Option<&str>, name: Option<&str>) -> MediaInfo {
        MediaInfo {
            kind,
            mime_type: mime.map(String::from),
            file_name: name.map(String::from),
            ttl_seconds: None,
        }
    }

    fn store(dir: &Path) -> MediaStore {
        let config = ArchiveConfig {
            media_dir: dir.join("scratch").display().to_string(),
            retained_dir: dir.join("retained").display().to_string(),
            ..ArchiveConfig::default()
        };
        let dispatcher = Dispatcher::new(
            Default::default(),
            Default::default(),
            CircuitBreaker::new(),
        );
        MediaStore::new(&config, Arc::new(dispatcher))
    }

    #[test]
    fn extension_detection() {
        assert_eq!(
            extension_for(&media(MediaKind::Photo, None, Some("x.png"))),
            "jpg"
        );
        assert_eq!(
            extension_for(&media(MediaKind::Document, None, Some("Report.PDF"))),
            "pdf"
        );
        assert_eq!(
            extension_for(&media(MediaKind::Document, Some("video/mp4"), Some("a.toolongext"))),
            "mp4"
        );
        assert_eq!(extension_for(&media(MediaKind::Voice, None, None)), "ogg");
        assert_eq!(
            extension_for(&media(MediaKind::RoundVideo, None, None)),
            "mp4"
        );
        assert_eq!(
            extension_for(&media(MediaKind::Document, Some("audio/mpeg"), None)),
            "mp3"
        );
        assert_eq!(extension_for(&media(MediaKind::Other, None, None)), "bin");
    }

    #[tokio::test(start_paused = true)]
    async fn download_then_retain() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let platform = MockPlatform::new(profile(1, "Owner"));
        let msg = photo_message(12, UserId(2), None);

        let file = store.download(UserId(1), &platform, &msg).await.unwrap();
        assert_eq!(file.size(), "media-12".len() as u64);
        assert_eq!(file.extension(), "jpg");

        let kept = store.retain(UserId(1), UserId(2), 12, &file).await.unwrap();
        assert!(kept.starts_with(dir.path().join("retained/user_1/contact_2")));
        let name = kept.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("msg_12_") && name.ends_with(".jpg"));

        let descriptor = store.describe(&msg, &file, Some(&kept));
        assert_eq!(descriptor.mime_type, "image/jpeg");
        assert_eq!(std::fs::metadata(&kept).unwrap().len(), descriptor.size);

        let scratch = file.path().to_path_buf();
        file.discard().await;
        assert!(!scratch.exists());
        assert!(kept.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_downloads_are_retried_with_linear_backoff() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let platform = MockPlatform::new(profile(1, "Owner"));
        platform.set_download_payload(Vec::new());
        let msg = photo_message(12, UserId(2), None);

        let start = tokio::time::Instant::now();
        let result = store.download(UserId(1), &platform, &msg).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert_eq!(platform.call_count("download_media"), 3);
        // 2s after the first failure, 4s after the second.
        assert!(start.elapsed() >= Duration::from_secs(6));
        let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let platform = MockPlatform::new(profile(1, "Owner"));
        platform.fail_next(
            "download_media",
            PlatformError::Transport("connection reset".into()),
        );
        let msg = photo_message(12, UserId(2), None);
        let file = store.download(UserId(1), &platform, &msg).await.unwrap();
        assert_eq!(platform.call_count("download_media"), 2);
        file.discard().await;
    }

    #[tokio::test(start_paused = true)]
    async fn revocation_is_not_retried() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let platform = MockPlatform::new(profile(1, "Owner"));
        platform.fail_next(
            "download_media",
            PlatformError::Revoked {
                reason: "SESSION_REVOKED".into(),
            },
        );
        let msg = photo_message(12, UserId(2), None);
        let result = store.download(UserId(1), &platform, &msg).await;
        let err = result.unwrap_err();
        assert!(err.is_escalating());
        assert_eq!(platform.call_count("download_media"), 1);
    }
}
