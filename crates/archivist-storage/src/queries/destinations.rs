// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive destination mappings, unique per (owner, contact|group).

use archivist_core::ArchivistError;
use archivist_core::types::{ChannelHandle, Destination, DestinationKey, UserId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, bad_value, decode_time, encode_time, map_tr_err};

pub async fn get_destination(
    db: &Database,
    owner: UserId,
    key: DestinationKey,
) -> Result<Option<Destination>, ArchivistError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT owner_id, kind, peer_id, channel_id, access_hash, title, created_at
                 FROM destinations WHERE owner_id = ?1 AND kind = ?2 AND peer_id = ?3",
                params![owner.0, key.kind(), key.peer_id()],
                |row| {
                    let kind: String = row.get(1)?;
                    let created: String = row.get(6)?;
                    let key = DestinationKey::from_parts(&kind, row.get(2)?)
                        .ok_or_else(|| bad_value(1, format!("unknown destination kind {kind}")))?;
                    Ok(Destination {
                        owner_id: UserId(row.get(0)?),
                        key,
                        channel: ChannelHandle {
                            id: row.get(3)?,
                            access_hash: row.get(4)?,
                        },
                        title: row.get(5)?,
                        created_at: decode_time(6, &created)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts a new mapping. Fails on a duplicate key or channel id.
pub async fn insert_destination(db: &Database, dest: &Destination) -> Result<(), ArchivistError> {
    let dest = dest.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO destinations
                     (owner_id, kind, peer_id, channel_id, access_hash, title, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    dest.owner_id.0,
                    dest.key.kind(),
                    dest.key.peer_id(),
                    dest.channel.id,
                    dest.channel.access_hash,
                    dest.title,
                    encode_time(&dest.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_access_hash(
    db: &Database,
    owner: UserId,
    key: DestinationKey,
    access_hash: i64,
) -> Result<(), ArchivistError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE destinations SET access_hash = ?4
                 WHERE owner_id = ?1 AND kind = ?2 AND peer_id = ?3",
                params![owner.0, key.kind(), key.peer_id(), access_hash],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_destination(
    db: &Database,
    owner: UserId,
    key: DestinationKey,
) -> Result<(), ArchivistError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM destinations WHERE owner_id = ?1 AND kind = ?2 AND peer_id = ?3",
                params![owner.0, key.kind(), key.peer_id()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
