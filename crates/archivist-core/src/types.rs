// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the session, archive, and storage layers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Platform user identifier. Owners, contacts, and parents share this space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a seam.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Platform,
    Storage,
    Control,
    Observability,
}

/// Connectivity of one owner's live session. Written only by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Connecting,
    Connected,
    Revoked,
    Disconnected,
}

/// A conversation as seen by the owner's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ChatRef {
    /// Private chat with another user.
    User(UserId),
    /// Legacy small group.
    BasicGroup(i64),
    /// Supergroup or broadcast channel.
    Channel(i64),
}

impl ChatRef {
    /// Normalized conversation id: user id for private chats, `-chat_id` for
    /// basic groups, `-1000000000000 - channel_id` for channels.
    pub fn conversation_id(&self) -> i64 {
        match self {
            Self::User(id) => id.0,
            Self::BasicGroup(id) => -id,
            Self::Channel(id) => -1_000_000_000_000 - id,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// Who sent a private message relative to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "me->other")]
    MeToOther,
    #[serde(rename = "other->me")]
    OtherToMe,
}

impl Direction {
    pub fn from_outgoing(outgoing: bool) -> Self {
        if outgoing {
            Self::MeToOther
        } else {
            Self::OtherToMe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeToOther => "me->other",
            Self::OtherToMe => "other->me",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "me->other" => Ok(Self::MeToOther),
            "other->me" => Ok(Self::OtherToMe),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Coarse media classification used for file naming and captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    RoundVideo,
    Audio,
    Voice,
    Document,
    Other,
}

/// Media attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub kind: MediaKind,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Set for self-destructing ("view once") media.
    #[serde(default)]
    pub ttl_seconds: Option<u32>,
}

impl MediaInfo {
    pub fn is_ephemeral(&self) -> bool {
        self.ttl_seconds.is_some()
    }
}

/// A message event delivered by an owner's connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: i32,
    pub chat: ChatRef,
    #[serde(default)]
    pub sender_id: Option<UserId>,
    /// True when the owner sent the message.
    #[serde(default)]
    pub outgoing: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<MediaInfo>,
    #[serde(default)]
    pub reply_to: Option<i32>,
    /// Shared by every item of a multi-item media group.
    #[serde(default)]
    pub grouped_id: Option<i64>,
    pub date: DateTime<Utc>,
}

impl InboundMessage {
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

/// Public profile of a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

impl UserProfile {
    /// Best human-readable name: full name, then `@username`, then the id.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => match &self.username {
                Some(u) => format!("@{u}"),
                None => self.id.to_string(),
            },
        }
    }
}

/// Identifier plus access credential of a platform channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelHandle {
    pub id: i64,
    pub access_hash: i64,
}

/// Result of looking up a channel the owner should be a member of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Owner is no longer a member.
    pub left: bool,
    /// Access hash currently issued by the platform.
    pub access_hash: i64,
}

/// A channel visible in the owner's dialog list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub handle: ChannelHandle,
    pub title: String,
    pub broadcast: bool,
}

/// An organizational folder in the owner's dialog list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogFolder {
    pub id: i32,
    pub title: String,
}

/// Outbound target for forwards, texts, and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Peer {
    /// The owner's own "saved messages" chat.
    SavedMessages,
    Channel(ChannelHandle),
}

/// What an archive destination is keyed on, within one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DestinationKey {
    Contact(UserId),
    /// Normalized group conversation id (see [`ChatRef::conversation_id`]).
    Group(i64),
}

impl DestinationKey {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Contact(_) => "contact",
            Self::Group(_) => "group",
        }
    }

    pub fn peer_id(&self) -> i64 {
        match self {
            Self::Contact(id) => id.0,
            Self::Group(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, peer_id: i64) -> Option<Self> {
        match kind {
            "contact" => Some(Self::Contact(UserId(peer_id))),
            "group" => Some(Self::Group(peer_id)),
            _ => None,
        }
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.peer_id())
    }
}

/// A platform channel used as an archive sink for one contact or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub owner_id: UserId,
    pub key: DestinationKey,
    pub channel: ChannelHandle,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Destination {
    pub fn peer(&self) -> Peer {
        Peer::Channel(self.channel)
    }
}

/// Descriptor of archived media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
    pub ephemeral: bool,
    /// Durable copy kept for tracked contacts.
    #[serde(default)]
    pub retained_path: Option<String>,
}

/// Immutable record of one archived private message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub owner_id: UserId,
    pub contact_id: UserId,
    pub message_id: i32,
    pub direction: Direction,
    #[serde(default)]
    pub text: Option<String>,
    pub forwarded: bool,
    #[serde(default)]
    pub media: Option<MediaDescriptor>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OwnerStatus {
    Active,
    Disabled,
}

/// Where archived private messages go.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArchiveMode {
    /// Per-contact destination channel only.
    #[default]
    Channel,
    /// Destination channel plus a mirror into saved messages.
    Saved,
    Both,
}

impl ArchiveMode {
    pub fn mirrors_to_saved(&self) -> bool {
        matches!(self, Self::Saved | Self::Both)
    }
}

/// Independent text/media toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivePolicy {
    pub archive_text: bool,
    pub archive_media: bool,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            archive_text: true,
            archive_media: true,
        }
    }
}

/// What a policy decides for one concrete message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applicability {
    pub text: bool,
    pub media: bool,
}

impl Applicability {
    pub fn any(&self) -> bool {
        self.text || self.media
    }
}

impl ArchivePolicy {
    /// Gates each toggle by the presence of text/media in the message.
    pub fn applied_to(&self, msg: &InboundMessage) -> Applicability {
        Applicability {
            text: self.archive_text && msg.has_text(),
            media: self.archive_media && msg.has_media(),
        }
    }
}

/// Per-contact override of the owner's global policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactOverride {
    pub contact_id: UserId,
    #[serde(flatten)]
    pub policy: ArchivePolicy,
}

/// An owner-configured group archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupArchive {
    /// Normalized conversation id.
    pub chat_id: i64,
    pub title: String,
    #[serde(flatten)]
    pub policy: ArchivePolicy,
}

/// The owner's record in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub id: UserId,
    pub status: OwnerStatus,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Master switch for private-chat archiving.
    pub archiving_enabled: bool,
    pub default_policy: ArchivePolicy,
    pub archive_mode: ArchiveMode,
    #[serde(default)]
    pub contact_overrides: Vec<ContactOverride>,
    #[serde(default)]
    pub groups: Vec<GroupArchive>,
    pub credential_present: bool,
}

impl OwnerRecord {
    /// A fresh record: active, archiving off, default toggles on.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            status: OwnerStatus::Active,
            first_name: None,
            username: None,
            phone: None,
            archiving_enabled: false,
            default_policy: ArchivePolicy::default(),
            archive_mode: ArchiveMode::default(),
            contact_overrides: Vec::new(),
            groups: Vec::new(),
            credential_present: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == OwnerStatus::Active
    }

    /// Per-contact override if present, else the global default.
    pub fn policy_for_contact(&self, contact: UserId) -> ArchivePolicy {
        self.contact_overrides
            .iter()
            .find(|o| o.contact_id == contact)
            .map(|o| o.policy)
            .unwrap_or(self.default_policy)
    }

    /// Groups are archived only when explicitly configured.
    pub fn group(&self, conversation_id: i64) -> Option<&GroupArchive> {
        self.groups.iter().find(|g| g.chat_id == conversation_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Approved,
    Rejected,
    Disconnected,
}

/// Owner consent for a parent to receive a mirrored stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringLink {
    pub owner_id: UserId,
    pub parent_id: UserId,
    pub status: LinkStatus,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
}

impl MonitoringLink {
    /// Approved and not yet expired. A link without expiry never expires.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LinkStatus::Approved && self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn msg(text: Option<&str>, media: bool) -> InboundMessage {
        InboundMessage {
            id: 1,
            chat: ChatRef::User(UserId(2)),
            sender_id: Some(UserId(2)),
            outgoing: false,
            text: text.map(String::from),
            media: media.then(|| MediaInfo {
                kind: MediaKind::Photo,
                mime_type: None,
                file_name: None,
                ttl_seconds: None,
            }),
            reply_to: None,
            grouped_id: None,
            date: Utc::now(),
        }
    }

    #[test]
    fn conversation_ids_are_normalized() {
        assert_eq!(ChatRef::User(UserId(42)).conversation_id(), 42);
        assert_eq!(ChatRef::BasicGroup(555).conversation_id(), -555);
        assert_eq!(ChatRef::Channel(1234).conversation_id(), -1_000_000_001_234);
    }

    #[test]
    fn override_beats_global_policy() {
        let mut owner = OwnerRecord::new(UserId(1));
        owner.contact_overrides.push(ContactOverride {
            contact_id: UserId(7),
            policy: ArchivePolicy {
                archive_text: false,
                archive_media: true,
            },
        });
        assert!(!owner.policy_for_contact(UserId(7)).archive_text);
        assert!(owner.policy_for_contact(UserId(8)).archive_text);
    }

    #[test]
    fn policy_is_gated_by_message_content() {
        let policy = ArchivePolicy::default();
        let a = policy.applied_to(&msg(Some("hi"), false));
        assert!(a.text && !a.media);

        let a = policy.applied_to(&msg(Some(""), false));
        assert!(!a.any());

        let media_only = ArchivePolicy {
            archive_text: false,
            archive_media: true,
        };
        assert!(!media_only.applied_to(&msg(Some("hi"), false)).any());
        assert!(media_only.applied_to(&msg(None, true)).media);
    }

    #[test]
    fn monitoring_link_activity() {
        let now = Utc::now();
        let mut link = MonitoringLink {
            owner_id: UserId(1),
            parent_id: UserId(2),
            status: LinkStatus::Approved,
            expires_at: Some(now + Duration::hours(1)),
            added_at: now,
        };
        assert!(link.is_active_at(now));

        link.expires_at = Some(now - Duration::seconds(1));
        assert!(!link.is_active_at(now));

        link.expires_at = None;
        assert!(link.is_active_at(now));

        link.status = LinkStatus::Pending;
        assert!(!link.is_active_at(now));
    }

    #[test]
    fn display_name_fallbacks() {
        let mut p = UserProfile {
            id: UserId(9),
            first_name: None,
            last_name: None,
            username: None,
            phone: None,
            is_bot: false,
        };
        assert_eq!(p.display_name(), "9");
        p.username = Some("ann".into());
        assert_eq!(p.display_name(), "@ann");
        p.first_name = Some("Ann".into());
        assert_eq!(p.display_name(), "Ann");
        p.last_name = Some("Lee".into());
        assert_eq!(p.display_name(), "Ann Lee");
    }

    #[test]
    fn direction_serde_uses_arrow_form() {
        let json = serde_json::to_string(&Direction::MeToOther).unwrap();
        assert_eq!(json, "\"me->other\"");
        assert_eq!("other->me".parse::<Direction>(), Ok(Direction::OtherToMe));
    }
}
