// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text of reconstructed archive messages and monitoring notices.

use chrono::{DateTime, Utc};

use archivist_core::types::{Direction, InboundMessage, MediaKind};

const EPHEMERAL_MARKER: &str = "⚠️ EPHEMERAL MEDIA (View Once)\n\
    🟡 This media was set to be viewed only once and has been archived.";

/// Appended to monitoring metadata when the media copy could not be sent.
pub const MEDIA_FAILED: &str = "📎 [Media failed to send]";

fn clock(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `(from, to)` for a private message between `me` and `other`.
fn ends<'a>(direction: Direction, me: &'a str, other: &'a str) -> (&'a str, &'a str) {
    match direction {
        Direction::MeToOther => (me, other),
        Direction::OtherToMe => (other, me),
    }
}

/// Header sent in place of a private message that could not be forwarded.
/// `text` is `None` when the text policy does not apply.
pub fn private_header(
    direction: Direction,
    owner_name: &str,
    contact_name: &str,
    date: DateTime<Utc>,
    message_id: i32,
    text: Option<&str>,
) -> String {
    let (from, to) = ends(direction, owner_name, contact_name);
    let body = text.filter(|t| !t.is_empty()).unwrap_or("[No text]");
    format!(
        "👤 {from} ➜ {to}\n🕒 {}\n🆔 Message ID: {message_id}\n\n{body}",
        clock(date)
    )
}

/// Caption of a re-uploaded private media file.
pub fn media_caption(direction: Direction, contact_name: &str, msg: &InboundMessage) -> String {
    let mut caption = format!(
        "📝 Direction: {direction}\n👤 With: {contact_name}\n\
         🕒 Time: {}\n🆔 Message ID: {}",
        msg.date.to_rfc3339(),
        msg.id
    );
    if let Some(text) = msg.text.as_deref().filter(|t| !t.is_empty()) {
        caption.push_str("\n\n💬 ");
        caption.push_str(text);
    }
    if msg.media.as_ref().is_some_and(|m| m.is_ephemeral()) {
        caption.push_str("\n\n");
        caption.push_str(EPHEMERAL_MARKER);
    }
    caption
}

/// Fallback for a group message that could not be forwarded.
pub fn group_metadata(sender_name: &str, group_title: &str, msg: &InboundMessage) -> String {
    let mut text = format!(
        "📋 Metadata Archive\n👤 From: {sender_name}\n📂 Group: {group_title}\n\
         🕒 Time: {}\n📨 Message ID: {}\n",
        clock(msg.date),
        msg.id
    );
    if let Some(body) = msg.text.as_deref().filter(|t| !t.is_empty()) {
        text.push_str("\n💬 Text:\n");
        text.push_str(body);
    }
    if let Some(media) = &msg.media {
        text.push_str("\n🎨 Media Type: ");
        text.push_str(media_label(media.kind));
    }
    text
}

fn monitoring_direction(direction: Direction, child: &str, contact: &str) -> String {
    let (from, to) = ends(direction, child, contact);
    format!("{from} ➜ {to}")
}

/// Text delivered into a parent's monitoring channel.
pub fn monitoring_metadata(
    direction: Direction,
    child: &str,
    contact: &str,
    msg: &InboundMessage,
) -> String {
    let body = msg
        .text
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or("[Media]");
    format!(
        "👶 {}\n🕒 {}\n\n{body}",
        monitoring_direction(direction, child, contact),
        clock(msg.date)
    )
}

/// Control-surface notice for a parent without a live session.
pub fn monitoring_alert(
    direction: Direction,
    child: &str,
    contact: &str,
    msg: &InboundMessage,
) -> String {
    let mut text = format!(
        "🔔 Monitoring Alert\n\n👶 {}\n🕒 {}",
        monitoring_direction(direction, child, contact),
        clock(msg.date)
    );
    if let Some(body) = msg.text.as_deref().filter(|t| !t.is_empty()) {
        text.push_str("\n\n💬 ");
        text.push_str(body);
    } else if let Some(media) = &msg.media {
        text.push_str("\n\n📎 ");
        text.push_str(media_label(media.kind));
    }
    text
}

pub fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "Photo",
        MediaKind::Video => "Video",
        MediaKind::RoundVideo => "Round video",
        MediaKind::Audio => "Audio",
        MediaKind::Voice => "Voice message",
        MediaKind::Document => "Document",
        MediaKind::Other => "Media",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::UserId;
    use archivist_core::types::{ChatRef, MediaInfo};
    use chrono::TimeZone;

    fn msg(text: Option<&str>, media: Option<MediaInfo>) -> InboundMessage {
        InboundMessage {
            id: 31,
            chat: ChatRef::User(UserId(2)),
            sender_id: Some(UserId(2)),
            outgoing: false,
            text: text.map(String::from),
            media,
            reply_to: None,
            grouped_id: None,
            date: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
        }
    }

    fn photo(ttl: Option<u32>) -> MediaInfo {
        MediaInfo {
            kind: MediaKind::Photo,
            mime_type: Some("image/jpeg".into()),
            file_name: None,
            ttl_seconds: ttl,
        }
    }

    #[test]
    fn private_header_orients_by_direction() {
        let date = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            private_header(Direction::MeToOther, "Owner", "Ann", date, 7, Some("hi")),
            "👤 Owner ➜ Ann\n🕒 2026-03-14 09:26:53 UTC\n🆔 Message ID: 7\n\nhi"
        );
        assert_eq!(
            private_header(Direction::OtherToMe, "Owner", "Ann", date, 8, None),
            "👤 Ann ➜ Owner\n🕒 2026-03-14 09:26:53 UTC\n🆔 Message ID: 8\n\n[No text]"
        );
    }

    #[test]
    fn ephemeral_media_is_marked() {
        let seen = msg(Some("look"), Some(photo(None)));
        let plain = media_caption(Direction::OtherToMe, "Ann", &seen);
        assert!(plain.contains("🆔 Message ID: 31"));
        assert!(plain.contains("💬 look"));
        assert!(!plain.contains("EPHEMERAL"));

        let view_once = msg(None, Some(photo(Some(10))));
        let once = media_caption(Direction::OtherToMe, "Ann", &view_once);
        assert!(once.ends_with("has been archived."));
        assert!(!once.contains("💬"));
    }

    #[test]
    fn group_metadata_lists_text_and_media() {
        let text = group_metadata("Bob", "Team", &msg(Some("agenda"), Some(photo(None))));
        assert!(text.starts_with("📋 Metadata Archive\n👤 From: Bob\n📂 Group: Team\n"));
        assert!(text.contains("💬 Text:\nagenda"));
        assert!(text.ends_with("🎨 Media Type: Photo"));
    }

    #[test]
    fn monitoring_texts() {
        let m = msg(None, Some(photo(None)));
        assert_eq!(
            monitoring_metadata(Direction::MeToOther, "Kid", "Ann", &m),
            "👶 Kid ➜ Ann\n🕒 2026-03-14 09:26:53 UTC\n\n[Media]"
        );
        assert_eq!(
            monitoring_alert(Direction::OtherToMe, "Kid", "Ann", &m),
            "🔔 Monitoring Alert\n\n👶 Ann ➜ Kid\n🕒 2026-03-14 09:26:53 UTC\n\n📎 Photo"
        );
        let t = msg(Some("hey"), None);
        assert!(monitoring_alert(Direction::OtherToMe, "Kid", "Ann", &t).ends_with("💬 hey"));
    }
}
