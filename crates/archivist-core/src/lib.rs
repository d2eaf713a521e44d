// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Archivist session/archive engine.
//!
//! This crate provides the error taxonomy, domain types, and the seam traits
//! that separate the orchestration core from the messaging platform, the
//! document store, and the owner-facing control surface.

pub mod error;
pub mod registry;
pub mod sync;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ArchivistError, PlatformError};
pub use registry::SessionRegistry;
pub use sync::KeyedLocks;
pub use types::{AdapterType, ConnectivityState, HealthStatus, UserId};

pub use traits::{
    ArchiveStore, AuthenticatedAccount, ControlSurface, LoginPrompts, MessageHandler,
    PlatformClient, PlatformConnector, PluginAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn adapter_type_round_trips_through_strings() {
        for variant in [
            AdapterType::Platform,
            AdapterType::Storage,
            AdapterType::Control,
            AdapterType::Observability,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn connectivity_state_display() {
        assert_eq!(ConnectivityState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectivityState::Revoked.to_string(), "revoked");
    }

    #[test]
    fn all_seams_are_object_safe() {
        fn _platform(_: &dyn PlatformClient) {}
        fn _connector(_: &dyn PlatformConnector) {}
        fn _prompts(_: &dyn LoginPrompts) {}
        fn _store(_: &dyn ArchiveStore) {}
        fn _control(_: &dyn ControlSurface) {}
        fn _handler(_: &dyn MessageHandler) {}
    }
}
