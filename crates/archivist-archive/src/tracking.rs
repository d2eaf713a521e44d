// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detailed-tracking allow-list.
//!
//! Contacts on this list get durable, queryable archive entries and retained
//! media copies. Entries may name a contact by id, username, or phone number;
//! username and phone entries are bound to an id the first time the contact
//! is seen. File format:
//!
//! ```json
//! [{ "target": { "id": 42, "userID": "ann", "phone": "+1 555 0100" } }]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use archivist_core::{ArchivistError, UserId};

/// One allow-list entry. At least one field is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedContact {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default, rename = "userID")]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl TrackedContact {
    fn is_empty(&self) -> bool {
        self.id.is_none() && self.username.is_none() && self.phone.is_none()
    }

    fn matches_username(&self, username: &str) -> bool {
        self.username
            .as_deref()
            .is_some_and(|u| u.trim_start_matches('@') == username.trim_start_matches('@'))
    }

    fn matches_phone(&self, phone: &str) -> bool {
        let wanted = digits(phone);
        !wanted.is_empty() && self.phone.as_deref().is_some_and(|p| digits(p) == wanted)
    }
}

#[derive(Serialize, Deserialize)]
struct FileEntry {
    target: TrackedContact,
}

fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// File-backed allow-list shared by every pipeline task.
pub struct TrackingRegistry {
    path: PathBuf,
    targets: RwLock<Vec<TrackedContact>>,
}

impl TrackingRegistry {
    /// An empty registry persisted at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            targets: RwLock::new(Vec::new()),
        }
    }

    /// Opens the registry and loads it. A missing or unreadable file yields
    /// an empty list.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let registry = Self::new(path);
        if let Err(e) = registry.reload().await {
            warn!(path = %registry.path.display(), error = %e, "tracking list not loaded");
        }
        registry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory list with the file's content.
    pub async fn reload(&self) -> Result<usize, ArchivistError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no tracking list");
                self.targets.write().await.clear();
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };
        let entries: Vec<FileEntry> = serde_json::from_slice(&raw)?;
        let targets: Vec<TrackedContact> = entries
            .into_iter()
            .map(|e| e.target)
            .filter(|t| {
                if t.is_empty() {
                    warn!("skipping tracking entry without identifiers");
                }
                !t.is_empty()
            })
            .collect();
        let count = targets.len();
        *self.targets.write().await = targets;
        info!(count, "tracking list loaded");
        Ok(count)
    }

    pub async fn is_tracked(&self, id: UserId) -> bool {
        self.targets.read().await.iter().any(|t| t.id == Some(id))
    }

    /// Binds `id` to an unresolved entry matching `username` or `phone`.
    /// Returns true when a binding was made and saved.
    pub async fn resolve(
        &self,
        id: UserId,
        username: Option<&str>,
        phone: Option<&str>,
    ) -> Result<bool, ArchivistError> {
        let mut targets = self.targets.write().await;
        if targets.iter().any(|t| t.id == Some(id)) {
            return Ok(false);
        }
        let Some(target) = targets.iter_mut().find(|t| {
            t.id.is_none()
                && (username.is_some_and(|u| t.matches_username(u))
                    || phone.is_some_and(|p| t.matches_phone(p)))
        }) else {
            return Ok(false);
        };
        target.id = Some(id);
        info!(contact_id = %id, "tracking entry resolved");
        self.save(&targets).await?;
        Ok(true)
    }

    /// Adds a resolved entry. Returns false if `id` is already listed.
    pub async fn add(
        &self,
        id: UserId,
        username: Option<&str>,
        phone: Option<&str>,
    ) -> Result<bool, ArchivistError> {
        let mut targets = self.targets.write().await;
        if targets.iter().any(|t| t.id == Some(id)) {
            return Ok(false);
        }
        targets.push(TrackedContact {
            id: Some(id),
            username: username.map(str::to_owned),
            phone: phone.map(str::to_owned),
        });
        self.save(&targets).await?;
        info!(contact_id = %id, "contact added to tracking list");
        Ok(true)
    }

    pub async fn remove(&self, id: UserId) -> Result<bool, ArchivistError> {
        let mut targets = self.targets.write().await;
        let before = targets.len();
        targets.retain(|t| t.id != Some(id));
        if targets.len() == before {
            return Ok(false);
        }
        self.save(&targets).await?;
        info!(contact_id = %id, "contact removed from tracking list");
        Ok(true)
    }

    /// Entries not yet bound to an id.
    pub async fn unresolved(&self) -> Vec<TrackedContact> {
        self.targets
            .read()
            .await
            .iter()
            .filter(|t| t.id.is_none())
            .cloned()
            .collect()
    }

    pub async fn entries(&self) -> Vec<TrackedContact> {
        self.targets.read().await.clone()
    }

    async fn save(&self, targets: &[TrackedContact]) -> Result<(), ArchivistError> {
        let entries: Vec<FileEntry> = targets
            .iter()
            .cloned()
            .map(|target| FileEntry { target })
            .collect();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
