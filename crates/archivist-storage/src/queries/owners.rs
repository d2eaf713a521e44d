// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owner records and monitoring links.

use archivist_core::ArchivistError;
use archivist_core::types::{
    ArchiveMode, ArchivePolicy, LinkStatus, MonitoringLink, OwnerRecord, OwnerStatus, UserId,
    UserProfile,
};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, bad_value, decode_time, encode_time, map_tr_err};

const OWNER_COLUMNS: &str = "id, status, first_name, username, phone, archiving_enabled, \
     archive_text, archive_media, archive_mode, contact_overrides, group_archives, \
     credential_present";

fn owner_from_row(row: &Row<'_>) -> Result<OwnerRecord, rusqlite::Error> {
    let status: String = row.get(1)?;
    let mode: String = row.get(8)?;
    let overrides: String = row.get(9)?;
    let groups: String = row.get(10)?;
    Ok(OwnerRecord {
        id: UserId(row.get(0)?),
        status: status
            .parse::<OwnerStatus>()
            .map_err(|e| bad_value(1, e.to_string()))?,
        first_name: row.get(2)?,
        username: row.get(3)?,
        phone: row.get(4)?,
        archiving_enabled: row.get(5)?,
        default_policy: ArchivePolicy {
            archive_text: row.get(6)?,
            archive_media: row.get(7)?,
        },
        archive_mode: mode
            .parse::<ArchiveMode>()
            .map_err(|e| bad_value(8, e.to_string()))?,
        contact_overrides: serde_json::from_str(&overrides)
            .map_err(|e| bad_value(9, e.to_string()))?,
        groups: serde_json::from_str(&groups).map_err(|e| bad_value(10, e.to_string()))?,
        credential_present: row.get(11)?,
    })
}

pub async fn get_owner(db: &Database, id: UserId) -> Result<Option<OwnerRecord>, ArchivistError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {OWNER_COLUMNS} FROM owners WHERE id = ?1"),
                params![id.0],
                owner_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts or fully replaces an owner record.
pub async fn upsert_owner(db: &Database, record: &OwnerRecord) -> Result<(), ArchivistError> {
    let record = record.clone();
    let overrides = serde_json::to_string(&record.contact_overrides)?;
    let groups = serde_json::to_string(&record.groups)?;
    let now = encode_time(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO owners (id, status, first_name, username, phone, archiving_enabled,
                     archive_text, archive_media, archive_mode, contact_overrides, group_archives,
                     credential_present, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                     status = excluded.status,
                     first_name = excluded.first_name,
                     username = excluded.username,
                     phone = excluded.phone,
                     archiving_enabled = excluded.archiving_enabled,
                     archive_text = excluded.archive_text,
                     archive_media = excluded.archive_media,
                     archive_mode = excluded.archive_mode,
                     contact_overrides = excluded.contact_overrides,
                     group_archives = excluded.group_archives,
                     credential_present = excluded.credential_present,
                     updated_at = excluded.updated_at",
                params![
                    record.id.0,
                    record.status.to_string(),
                    record.first_name,
                    record.username,
                    record.phone,
                    record.archiving_enabled,
                    record.default_policy.archive_text,
                    record.default_policy.archive_media,
                    record.archive_mode.to_string(),
                    overrides,
                    groups,
                    record.credential_present,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_status(
    db: &Database,
    id: UserId,
    status: OwnerStatus,
) -> Result<(), ArchivistError> {
    let now = encode_time(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE owners SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.0, status.to_string(), now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_credential_present(
    db: &Database,
    id: UserId,
    present: bool,
) -> Result<(), ArchivistError> {
    let now = encode_time(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE owners SET credential_present = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.0, present, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Stores login profile fields and re-activates the owner. Policy columns
/// keep their current values (or defaults for a new row).
pub async fn record_profile(db: &Database, profile: &UserProfile) -> Result<(), ArchivistError> {
    let profile = profile.clone();
    let now = encode_time(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO owners (id, status, first_name, username, phone, updated_at)
                 VALUES (?1, 'active', ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     status = 'active',
                     first_name = excluded.first_name,
                     username = excluded.username,
                     phone = excluded.phone,
                     updated_at = excluded.updated_at",
                params![
                    profile.id.0,
                    profile.first_name,
                    profile.username,
                    profile.phone,
                    now
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn links_for(
    db: &Database,
    owner: UserId,
) -> Result<Vec<MonitoringLink>, ArchivistError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT owner_id, parent_id, status, expires_at, added_at
                 FROM monitoring_links WHERE owner_id = ?1 ORDER BY added_at",
            )?;
            let rows = stmt.query_map(params![owner.0], |row| {
                let status: String = row.get(2)?;
                let expires: Option<String> = row.get(3)?;
                let added: String = row.get(4)?;
                Ok(MonitoringLink {
                    owner_id: UserId(row.get(0)?),
                    parent_id: UserId(row.get(1)?),
                    status: status
                        .parse::<LinkStatus>()
                        .map_err(|e| bad_value(2, e.to_string()))?,
                    expires_at: expires.map(|raw| decode_time(3, &raw)).transpose()?,
                    added_at: decode_time(4, &added)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_link(db: &Database, link: &MonitoringLink) -> Result<(), ArchivistError> {
    let link = link.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO monitoring_links (owner_id, parent_id, status, expires_at, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(owner_id, parent_id) DO UPDATE SET
                     status = excluded.status,
                     expires_at = excluded.expires_at",
                params![
                    link.owner_id.0,
                    link.parent_id.0,
                    link.status.to_string(),
                    link.expires_at.as_ref().map(encode_time),
                    encode_time(&link.added_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
