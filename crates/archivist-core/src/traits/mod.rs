// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits between the core and its external collaborators.
//!
//! Adapters extend [`PluginAdapter`] and use `#[async_trait]` for dynamic
//! dispatch compatibility.

pub mod adapter;
pub mod control;
pub mod handler;
pub mod platform;
pub mod storage;

pub use adapter::PluginAdapter;
pub use control::ControlSurface;
pub use handler::MessageHandler;
pub use platform::{AuthenticatedAccount, LoginPrompts, PlatformClient, PlatformConnector};
pub use storage::ArchiveStore;
