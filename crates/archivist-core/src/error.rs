// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Archivist engine.
//!
//! [`PlatformError`] classifies raw failures reported by the messaging
//! platform. [`ArchivistError`] is the cross-crate error every component
//! returns; it wraps platform errors and adds the conditions that escalate
//! past a single component (session revocation, platform-wide blocking).

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static FLOOD_WAIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FLOOD_WAIT_(\d+)").expect("static regex is valid"));

/// Error signatures that mean the remote side invalidated the session.
pub const REVOCATION_SIGNATURES: [&str; 4] = [
    "AUTH_KEY_UNREGISTERED",
    "SESSION_REVOKED",
    "USER_DEACTIVATED",
    "AUTH_KEY_DUPLICATED",
];

/// A failure reported by the messaging platform for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Per-operation cooldown; the call may be retried after `seconds`.
    #[error("flood wait of {seconds}s requested")]
    FloodWait { seconds: u64 },

    /// HTTP-429-class response: the whole network endpoint is being blocked.
    #[error("too many requests")]
    TooManyRequests,

    /// The session credential is no longer accepted.
    #[error("session invalidated: {reason}")]
    Revoked { reason: String },

    /// The channel no longer exists or is no longer reachable.
    #[error("channel gone: {reason}")]
    ChannelGone { reason: String },

    /// The stored access hash for a channel was rejected.
    #[error("channel access hash rejected")]
    AccessHashInvalid,

    /// The platform refused to forward this message.
    #[error("forward refused")]
    ForwardRefused,

    /// Any other RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// Network-level failure talking to the platform.
    #[error("transport error: {0}")]
    Transport(String),
}

impl PlatformError {
    /// Classifies a raw RPC error by code and message text.
    pub fn from_rpc(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();

        if code == 429 || message.contains("Too Many Requests") {
            return Self::TooManyRequests;
        }
        if let Some(caps) = FLOOD_WAIT.captures(&message)
            && let Ok(seconds) = caps[1].parse::<u64>()
        {
            return Self::FloodWait { seconds };
        }
        if let Some(sig) = REVOCATION_SIGNATURES
            .iter()
            .find(|sig| message.contains(*sig))
        {
            return Self::Revoked {
                reason: (*sig).to_string(),
            };
        }
        if message.contains("ACCESS_HASH_INVALID") {
            return Self::AccessHashInvalid;
        }
        if message.contains("CHANNEL_INVALID") || message.contains("CHANNEL_PRIVATE") {
            return Self::ChannelGone { reason: message };
        }
        Self::Rpc { code, message }
    }

    /// Returns true when this error carries a session-invalidation signature.
    pub fn is_revocation(&self) -> bool {
        matches!(self, Self::Revoked { .. })
    }

    /// The revocation reason, if this error is a revocation.
    pub fn revocation_reason(&self) -> Option<&str> {
        match self {
            Self::Revoked { reason } => Some(reason),
            _ => None,
        }
    }
}

/// The primary error type used across Archivist components.
#[derive(Debug, Error)]
pub enum ArchivistError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A platform call failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The login handshake failed or was abandoned.
    #[error("login handshake failed: {0}")]
    Handshake(String),

    /// Outbound traffic is suspended after a platform-wide block.
    #[error("outbound traffic is blocked by the platform; manual resume required")]
    PlatformBlocked,

    /// A flood wait persisted through every retry.
    #[error("throttle retries exhausted after {attempts} attempts")]
    ThrottleExhausted { attempts: u32 },

    /// Queued work was dropped before it ran.
    #[error("operation cancelled")]
    Cancelled,

    /// A requested record or session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ArchivistError {
    /// Errors that must escalate past component-local recovery: session
    /// invalidation and platform-wide blocking.
    pub fn is_escalating(&self) -> bool {
        match self {
            Self::PlatformBlocked => true,
            Self::Platform(e) => e.is_revocation() || *e == PlatformError::TooManyRequests,
            _ => false,
        }
    }

    /// The platform error this wraps, if any.
    pub fn platform(&self) -> Option<&PlatformError> {
        match self {
            Self::Platform(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ArchivistError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage {
            source: Box::new(e),
        }
    }
}

impl From<serde_json::Error> for ArchivistError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage {
            source: Box::new(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_wait_is_parsed() {
        assert_eq!(
            PlatformError::from_rpc(420, "FLOOD_WAIT_17"),
            PlatformError::FloodWait { seconds: 17 }
        );
        assert_eq!(
            PlatformError::from_rpc(420, "A wait of 5 seconds is required (FLOOD_WAIT_5)"),
            PlatformError::FloodWait { seconds: 5 }
        );
    }

    #[test]
    fn too_many_requests_wins_over_everything() {
        assert_eq!(
            PlatformError::from_rpc(429, "FLOOD_WAIT_3"),
            PlatformError::TooManyRequests
        );
        assert_eq!(
            PlatformError::from_rpc(500, "Too Many Requests"),
            PlatformError::TooManyRequests
        );
    }

    #[test]
    fn revocation_signatures_are_detected() {
        for sig in REVOCATION_SIGNATURES {
            let err = PlatformError::from_rpc(401, format!("RPCError 401: {sig} (caused by X)"));
            assert!(err.is_revocation(), "{sig} should be a revocation");
            assert_eq!(err.revocation_reason(), Some(sig));
        }
        assert!(!PlatformError::from_rpc(400, "MESSAGE_ID_INVALID").is_revocation());
    }

    #[test]
    fn channel_errors_are_classified() {
        assert!(matches!(
            PlatformError::from_rpc(400, "CHANNEL_PRIVATE"),
            PlatformError::ChannelGone { .. }
        ));
        assert!(matches!(
            PlatformError::from_rpc(400, "CHANNEL_INVALID"),
            PlatformError::ChannelGone { .. }
        ));
        assert_eq!(
            PlatformError::from_rpc(400, "ACCESS_HASH_INVALID"),
            PlatformError::AccessHashInvalid
        );
    }

    #[test]
    fn escalation_covers_revocation_and_blocking() {
        assert!(ArchivistError::PlatformBlocked.is_escalating());
        assert!(
            ArchivistError::from(PlatformError::Revoked {
                reason: "SESSION_REVOKED".into()
            })
            .is_escalating()
        );
        assert!(ArchivistError::from(PlatformError::TooManyRequests).is_escalating());
        assert!(!ArchivistError::ThrottleExhausted { attempts: 3 }.is_escalating());
        assert!(!ArchivistError::from(PlatformError::ForwardRefused).is_escalating());
    }
}
