// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `archivist tracking`: edits the allow-list of contacts that get archive
//! entries and retained media.
//!
//! A running service reads the file at startup only; restart it after
//! editing.

use archivist_archive::{TrackedContact, TrackingRegistry};
use archivist_config::ArchivistConfig;
use archivist_core::{ArchivistError, UserId};

async fn open(config: &ArchivistConfig) -> Result<TrackingRegistry, ArchivistError> {
    let registry = TrackingRegistry::new(&config.archive.tracking_file);
    registry.reload().await?;
    Ok(registry)
}

fn describe(contact: &TrackedContact) -> String {
    let id = contact
        .id
        .map_or_else(|| "(unresolved)".to_string(), |id| id.to_string());
    let mut line = id;
    if let Some(username) = &contact.username {
        line.push_str(&format!(" @{}", username.trim_start_matches('@')));
    }
    if let Some(phone) = &contact.phone {
        line.push_str(&format!(" {phone}"));
    }
    line
}

pub async fn run_list(config: &ArchivistConfig) -> Result<(), ArchivistError> {
    let registry = open(config).await?;
    let entries = registry.entries().await;
    if entries.is_empty() {
        println!("tracking list is empty");
    }
    for contact in &entries {
        println!("{}", describe(contact));
    }
    Ok(())
}

pub async fn run_add(
    config: &ArchivistConfig,
    id: i64,
    username: Option<&str>,
    phone: Option<&str>,
) -> Result<(), ArchivistError> {
    let registry = open(config).await?;
    if registry.add(UserId(id), username, phone).await? {
        println!("now tracking {id}");
    } else {
        println!("{id} is already tracked");
    }
    Ok(())
}

pub async fn run_remove(config: &ArchivistConfig, id: i64) -> Result<(), ArchivistError> {
    let registry = open(config).await?;
    if registry.remove(UserId(id)).await? {
        println!("stopped tracking {id}");
    } else {
        println!("{id} was not tracked");
    }
    Ok(())
}
