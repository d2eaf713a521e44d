// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only archive entries.

use archivist_core::ArchivistError;
use archivist_core::types::{ArchiveEntry, Direction, MediaDescriptor, UserId};
use rusqlite::params;

use crate::database::{Database, bad_value, decode_time, encode_time, map_tr_err};

pub async fn append_entry(db: &Database, entry: &ArchiveEntry) -> Result<(), ArchivistError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            let media = entry.media.as_ref();
            conn.execute(
                "INSERT INTO archive_entries
                     (owner_id, contact_id, message_id, direction, text, forwarded,
                      media_file_name, media_size, media_mime_type, media_ephemeral,
                      media_retained_path, date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    entry.owner_id.0,
                    entry.contact_id.0,
                    entry.message_id,
                    entry.direction.as_str(),
                    entry.text,
                    entry.forwarded,
                    media.map(|m| m.file_name.clone()),
                    media.map(|m| m.size as i64),
                    media.map(|m| m.mime_type.clone()),
                    media.map(|m| m.ephemeral),
                    media.and_then(|m| m.retained_path.clone()),
                    encode_time(&entry.date),
                    encode_time(&entry.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Entries for one (owner, contact) pair in message time order.
pub async fn entries_for(
    db: &Database,
    owner: UserId,
    contact: UserId,
) -> Result<Vec<ArchiveEntry>, ArchivistError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT owner_id, contact_id, message_id, direction, text, forwarded,
                        media_file_name, media_size, media_mime_type, media_ephemeral,
                        media_retained_path, date, created_at
                 FROM archive_entries
                 WHERE owner_id = ?1 AND contact_id = ?2
                 ORDER BY date ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![owner.0, contact.0], |row| {
                let direction: String = row.get(3)?;
                let file_name: Option<String> = row.get(6)?;
                let media = match file_name {
                    Some(file_name) => Some(MediaDescriptor {
                        file_name,
                        size: row.get::<_, Option<i64>>(7)?.unwrap_or_default().max(0) as u64,
                        mime_type: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                        ephemeral: row.get::<_, Option<bool>>(9)?.unwrap_or_default(),
                        retained_path: row.get(10)?,
                    }),
                    None => None,
                };
                let date: String = row.get(11)?;
                let created: String = row.get(12)?;
                Ok(ArchiveEntry {
                    owner_id: UserId(row.get(0)?),
                    contact_id: UserId(row.get(1)?),
                    message_id: row.get(2)?,
                    direction: direction
                        .parse::<Direction>()
                        .map_err(|e| bad_value(3, e))?,
                    text: row.get(4)?,
                    forwarded: row.get(5)?,
                    media,
                    date: decode_time(11, &date)?,
                    created_at: decode_time(12, &created)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    async fn open_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("entries.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn entry(message_id: i32, offset_secs: i64, media: Option<MediaDescriptor>) -> ArchiveEntry {
        let base = Utc::now();
        ArchiveEntry {
            owner_id: UserId(1),
            contact_id: UserId(2),
            message_id,
            direction: Direction::OtherToMe,
            text: Some(format!("message {message_id}")),
            forwarded: media.is_none(),
            media,
            date: base + Duration::seconds(offset_secs),
            created_at: base,
        }
    }

    #[tokio::test]
    async fn entries_come_back_in_time_order() {
        let (db, _dir) = open_test_db().await;
        append_entry(&db, &entry(3, 30, None)).await.unwrap();
        append_entry(&db, &entry(1, 10, None)).await.unwrap();
        append_entry(&db, &entry(2, 20, None)).await.unwrap();

        let ids: Vec<i32> = entries_for(&db, UserId(1), UserId(2))
            .await
            .unwrap()
            .iter()
            .map(|e| e.message_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(entries_for(&db, UserId(1), UserId(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn media_descriptor_round_trips() {
        let (db, _dir) = open_test_db().await;
        let media = MediaDescriptor {
            file_name: "msg_5_1700000000.jpg".into(),
            size: 48_213,
            mime_type: "image/jpeg".into(),
            ephemeral: true,
            retained_path: Some("/srv/keep/user_1/contact_2/msg_5_1700000000.jpg".into()),
        };
        let e = entry(5, 0, Some(media.clone()));
        append_entry(&db, &e).await.unwrap();

        let loaded = entries_for(&db, UserId(1), UserId(2)).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].media.as_ref(), Some(&media));
        assert!(!loaded[0].forwarded);
        assert_eq!(loaded[0].direction, Direction::OtherToMe);
    }
}
