// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `archivist sessions`: offline maintenance of the credential directory.

use std::path::Path;

use archivist_config::ArchivistConfig;
use archivist_core::ArchivistError;
use archivist_session::{CredentialInfo, CredentialStore};

fn format_table(infos: &[CredentialInfo]) -> String {
    if infos.is_empty() {
        return "no stored sessions\n".to_string();
    }
    let mut out = format!(
        "{:<14} {:<16} {:<20} {:<20}\n",
        "OWNER", "PHONE", "CREATED", "LAST USED"
    );
    for info in infos {
        out.push_str(&format!(
            "{:<14} {:<16} {:<20} {:<20}\n",
            info.owner.to_string(),
            info.phone_number.as_deref().unwrap_or("-"),
            info.created_at.format("%Y-%m-%d %H:%M"),
            info.last_used.format("%Y-%m-%d %H:%M"),
        ));
    }
    out
}

pub async fn run_list(config: &ArchivistConfig) -> Result<(), ArchivistError> {
    let store = CredentialStore::new(&config.sessions.dir);
    let mut infos = store.list().await?;
    infos.sort_by_key(|i| i.owner);
    print!("{}", format_table(&infos));
    Ok(())
}

pub async fn run_migrate(
    config: &ArchivistConfig,
    file: Option<&Path>,
) -> Result<(), ArchivistError> {
    let store = CredentialStore::new(&config.sessions.dir);
    let legacy = file.unwrap_or_else(|| Path::new(&config.sessions.legacy_file));
    let migrated = store.migrate_legacy(legacy).await?;
    println!(
        "migrated {migrated} credential(s) from {}",
        legacy.display()
    );
    Ok(())
}

pub async fn run_cleanup(
    config: &ArchivistConfig,
    days: Option<u32>,
) -> Result<(), ArchivistError> {
    let store = CredentialStore::new(&config.sessions.dir);
    let days = days.unwrap_or(config.sessions.stale_after_days);
    let removed = store.cleanup_stale(days).await?;
    println!("removed {removed} credential(s) unused for more than {days} day(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::UserId;
    use chrono::{TimeZone, Utc};

    #[test]
    fn empty_table_says_so() {
        assert_eq!(format_table(&[]), "no stored sessions\n");
    }

    #[test]
    fn table_lists_each_owner() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 0).unwrap();
        let infos = vec![
            CredentialInfo {
                owner: UserId(42),
                phone_number: Some("+15550000042".into()),
                created_at: at,
                last_used: at,
            },
            CredentialInfo {
                owner: UserId(7),
                phone_number: None,
                created_at: at,
                last_used: at,
            },
        ];
        let table = format_table(&infos);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("42"));
        assert!(lines[1].contains("+15550000042"));
        assert!(lines[1].contains("2026-03-14 09:26"));
        assert!(lines[2].contains(" - "));
    }

    #[tokio::test]
    async fn migrate_uses_the_configured_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("session.json");
        std::fs::write(&legacy, r#"{"11": "tok-11"}"#).unwrap();

        let mut config = ArchivistConfig::default();
        config.sessions.dir = dir.path().join("sessions").display().to_string();
        config.sessions.legacy_file = legacy.display().to_string();

        run_migrate(&config, None).await.unwrap();

        let store = CredentialStore::new(&config.sessions.dir);
        store.load().await.unwrap();
        assert!(store.contains(UserId(11)));
        assert!(!legacy.exists());
    }
}
