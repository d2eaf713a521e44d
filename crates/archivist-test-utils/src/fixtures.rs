// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for common domain values.

use chrono::{TimeZone, Utc};

use archivist_core::types::{ChatRef, InboundMessage, MediaInfo, MediaKind, UserId, UserProfile};

pub fn profile(id: i64, first_name: &str) -> UserProfile {
    UserProfile {
        id: UserId(id),
        first_name: Some(first_name.to_string()),
        last_name: None,
        username: None,
        phone: Some(format!("+1555{id:07}")),
        is_bot: false,
    }
}

pub fn bot_profile(id: i64, username: &str) -> UserProfile {
    UserProfile {
        id: UserId(id),
        first_name: None,
        last_name: None,
        username: Some(username.to_string()),
        phone: None,
        is_bot: true,
    }
}

/// A private-chat text message with `contact`. `outgoing` means the owner sent it.
pub fn text_message(id: i32, contact: UserId, outgoing: bool, text: &str) -> InboundMessage {
    let date = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).single();
    InboundMessage {
        id,
        chat: ChatRef::User(contact),
        sender_id: Some(contact),
        outgoing,
        text: Some(text.to_string()),
        media: None,
        reply_to: None,
        grouped_id: None,
        date: date.unwrap_or_default(),
    }
}

/// A private-chat photo with an optional caption.
pub fn photo_message(id: i32, contact: UserId, caption: Option<&str>) -> InboundMessage {
    let mut msg = text_message(id, contact, false, caption.unwrap_or_default());
    if caption.is_none() {
        msg.text = None;
    }
    msg.media = Some(MediaInfo {
        kind: MediaKind::Photo,
        mime_type: Some("image/jpeg".into()),
        file_name: None,
        ttl_seconds: None,
    });
    msg
}

/// A message in a supergroup, sent by `sender`.
pub fn group_message(id: i32, channel_id: i64, sender: UserId, text: &str) -> InboundMessage {
    let mut msg = text_message(id, sender, false, text);
    msg.chat = ChatRef::Channel(channel_id);
    msg
}
