// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed store of owner session tokens.
//!
//! One JSON document per owner (`user_<id>.json`) in a single directory.
//! Tokens are wrapped in [`SecretString`] as soon as they are read and never
//! appear in logs.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use archivist_core::{ArchivistError, UserId};

/// On-disk shape of one credential file.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    user_id: UserId,
    session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// Metadata about a stored credential, without the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialInfo {
    pub owner: UserId,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

pub struct CredentialStore {
    dir: PathBuf,
    cache: DashMap<UserId, SecretString>,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, owner: UserId) -> PathBuf {
        self.dir.join(format!("user_{owner}.json"))
    }

    async fn ensure_dir(&self) -> Result<(), ArchivistError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Reads every credential file into memory. Malformed files are skipped.
    pub async fn load(&self) -> Result<usize, ArchivistError> {
        for file in self.read_all().await? {
            self.cache
                .insert(file.user_id, SecretString::from(file.session));
        }
        info!(count = self.cache.len(), dir = %self.dir.display(), "credentials loaded");
        Ok(self.cache.len())
    }

    async fn read_all(&self) -> Result<Vec<CredentialFile>, ArchivistError> {
        self.ensure_dir().await?;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("user_") && name.ends_with(".json")) {
                continue;
            }
            match read_file(&entry.path()).await {
                Ok(file) => files.push(file),
                Err(e) => warn!(file = %name, error = %e, "skipping unreadable credential file"),
            }
        }
        Ok(files)
    }

    /// Persists a fresh credential for `owner`, replacing any previous one.
    pub async fn save(
        &self,
        owner: UserId,
        session: &SecretString,
        phone_number: Option<&str>,
    ) -> Result<(), ArchivistError> {
        self.ensure_dir().await?;
        let now = Utc::now();
        let file = CredentialFile {
            user_id: owner,
            session: session.expose_secret().to_owned(),
            phone_number: phone_number.map(str::to_owned),
            created_at: now,
            last_used: now,
        };
        self.write_file(owner, &file).await?;
        let cached = SecretString::from(session.expose_secret().to_owned());
        self.cache.insert(owner, cached);
        info!(owner = %owner, "credential stored");
        Ok(())
    }

    async fn write_file(&self, owner: UserId, file: &CredentialFile) -> Result<(), ArchivistError> {
        let path = self.file_for(owner);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(file)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub fn get(&self, owner: UserId) -> Option<SecretString> {
        self.cache
            .get(&owner)
            .map(|s| SecretString::from(s.expose_secret().to_owned()))
    }

    pub fn contains(&self, owner: UserId) -> bool {
        self.cache.contains_key(&owner)
    }

    /// Every cached credential, ordered by owner id.
    pub fn all(&self) -> Vec<(UserId, SecretString)> {
        let mut all: Vec<_> = self
            .cache
            .iter()
            .map(|e| {
                (
                    *e.key(),
                    SecretString::from(e.value().expose_secret().to_owned()),
                )
            })
            .collect();
        all.sort_by_key(|(owner, _)| *owner);
        all
    }

    /// Erases the credential. A missing file is not an error.
    pub async fn delete(&self, owner: UserId) -> Result<(), ArchivistError> {
        self.cache.remove(&owner);
        match tokio::fs::remove_file(self.file_for(owner)).await {
            Ok(()) => {
                info!(owner = %owner, "credential deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Bumps the last-used timestamp. Best effort.
    pub async fn touch(&self, owner: UserId) {
        let path = self.file_for(owner);
        let result = async {
            let mut file = read_file(&path).await?;
            file.last_used = Utc::now();
            self.write_file(owner, &file).await
        }
        .await;
        if let Err(e) = result {
            debug!(owner = %owner, error = %e, "could not update credential last-used time");
        }
    }

    /// Metadata for every credential file on disk.
    pub async fn list(&self) -> Result<Vec<CredentialInfo>, ArchivistError> {
        let mut infos: Vec<CredentialInfo> = self
            .read_all()
            .await?
            .into_iter()
            .map(|f| CredentialInfo {
                owner: f.user_id,
                phone_number: f.phone_number,
                created_at: f.created_at,
                last_used: f.last_used,
            })
            .collect();
        infos.sort_by_key(|i| i.owner);
        Ok(infos)
    }

    /// Deletes credentials unused for more than `days` days.
    pub async fn cleanup_stale(&self, days: u32) -> Result<usize, ArchivistError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let mut removed = 0;
        for info in self.list().await? {
            if info.last_used < cutoff {
                self.delete(info.owner).await?;
                removed += 1;
            }
        }
        info!(removed, days, "stale credentials cleaned up");
        Ok(removed)
    }

    /// Converts a legacy single-map file (`{"<owner>": "<token>"}`) into
    /// per-owner files, then renames it to `<file>.backup`.
    pub async fn migrate_legacy(&self, legacy: &Path) -> Result<usize, ArchivistError> {
        let raw = match tokio::fs::read(legacy).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %legacy.display(), "no legacy credential file");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };
        let map: HashMap<String, String> = serde_json::from_slice(&raw)?;

        let mut migrated = 0;
        for (key, token) in map {
            let Ok(id) = key.trim().parse::<i64>() else {
                warn!(key = %key, "skipping legacy entry with a non-numeric owner id");
                continue;
            };
            self.save(UserId(id), &SecretString::from(token), None)
                .await?;
            migrated += 1;
        }

        let mut backup = legacy.as_os_str().to_owned();
        backup.push(".backup");
        tokio::fs::rename(legacy, &backup).await?;
        info!(migrated, backup = %Path::new(&backup).display(), "legacy credentials migrated");
        Ok(migrated)
    }
}

async fn read_file(path: &Path) -> Result<CredentialFile, ArchivistError> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn save_then_reload_from_disk() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store
            .save(UserId(42), &secret("tok-42"), Some("+15550042"))
            .await
            .unwrap();
        assert!(dir.path().join("user_42.json").exists());

        let fresh = CredentialStore::new(dir.path());
        assert_eq!(fresh.load().await.unwrap(), 1);
        assert_eq!(fresh.get(UserId(42)).unwrap().expose_secret(), "tok-42");
        let info = fresh.list().await.unwrap();
        assert_eq!(info[0].phone_number.as_deref(), Some("+15550042"));
    }

    #[tokio::test]
    async fn malformed_files_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("user_1.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(UserId(2), &secret("ok"), None).await.unwrap();

        let fresh = CredentialStore::new(dir.path());
        assert_eq!(fresh.load().await.unwrap(), 1);
        assert!(fresh.contains(UserId(2)));
        assert!(!fresh.contains(UserId(1)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(UserId(3), &secret("x"), None).await.unwrap();
        store.delete(UserId(3)).await.unwrap();
        store.delete(UserId(3)).await.unwrap();
        assert!(store.get(UserId(3)).is_none());
        assert!(!dir.path().join("user_3.json").exists());
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_credentials() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(UserId(1), &secret("fresh"), None).await.unwrap();

        let old = Utc::now() - Duration::days(45);
        let stale = CredentialFile {
            user_id: UserId(2),
            session: "stale".into(),
            phone_number: None,
            created_at: old,
            last_used: old,
        };
        std::fs::write(
            dir.path().join("user_2.json"),
            serde_json::to_vec(&stale).unwrap(),
        )
        .unwrap();
        store.load().await.unwrap();

        assert_eq!(store.cleanup_stale(30).await.unwrap(), 1);
        assert!(store.contains(UserId(1)));
        assert!(!store.contains(UserId(2)));
    }

    #[tokio::test]
    async fn touch_updates_last_used() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(UserId(5), &secret("t"), None).await.unwrap();
        let before = store.list().await.unwrap()[0].last_used;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.touch(UserId(5)).await;
        let after = store.list().await.unwrap()[0].last_used;
        assert!(after > before);
        // Touching an unknown owner is silently ignored.
        store.touch(UserId(99)).await;
    }

    #[tokio::test]
    async fn legacy_map_is_migrated_and_backed_up() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("session.json");
        let map = r#"{"10": "tok-a", "11": "tok-b", "bogus": "tok-c"}"#;
        std::fs::write(&legacy, map).unwrap();

        let store = CredentialStore::new(dir.path().join("sessions"));
        assert_eq!(store.migrate_legacy(&legacy).await.unwrap(), 2);
        assert!(!legacy.exists());
        assert!(dir.path().join("session.json.backup").exists());
        assert_eq!(store.get(UserId(11)).unwrap().expose_secret(), "tok-b");

        // Second run finds nothing to do.
        assert_eq!(store.migrate_legacy(&legacy).await.unwrap(), 0);
    }
}
