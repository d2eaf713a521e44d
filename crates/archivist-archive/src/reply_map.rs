// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source message id to archived message id, per (owner, conversation).
//!
//! Process-lifetime only. After a restart, replies to messages archived
//! before the restart land unanchored.

use std::collections::HashMap;

use dashmap::DashMap;

use archivist_core::UserId;

#[derive(Default)]
pub struct ReplyMap {
    maps: DashMap<(UserId, i64), HashMap<i32, i32>>,
}

impl ReplyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: UserId, conversation: i64, source: i32) -> Option<i32> {
        self.maps
            .get(&(owner, conversation))
            .and_then(|m| m.get(&source).copied())
    }

    pub fn record(&self, owner: UserId, conversation: i64, source: i32, archived: i32) {
        self.maps
            .entry((owner, conversation))
            .or_default()
            .insert(source, archived);
    }

    /// Drops every conversation of `owner`.
    pub fn forget_owner(&self, owner: UserId) {
        self.maps.retain(|(o, _), _| *o != owner);
    }

    /// Mapped message count for one conversation.
    pub fn len_for(&self, owner: UserId, conversation: i64) -> usize {
        self.maps
            .get(&(owner, conversation))
            .map_or(0, |m| m.len())
    }
}
