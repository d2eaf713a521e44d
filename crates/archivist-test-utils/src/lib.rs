// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Archivist crates.
//!
//! Provides mock adapters for fast, deterministic tests without a real
//! platform bridge, database, or control bot.
//!
//! # Components
//!
//! - [`MockPlatform`] - scripted platform connection recording every call
//! - [`MockConnector`] - token-to-platform connector with a scripted login
//! - [`RecordingControl`] - control surface capturing notifications
//! - [`MemoryStore`] - in-memory document store

pub mod fixtures;
pub mod memory_store;
pub mod mock_connector;
pub mod mock_platform;
pub mod recording_control;

pub use memory_store::MemoryStore;
pub use mock_connector::{LoginScript, LoginTranscript, MockConnector};
pub use mock_platform::{MockChannelState, MockFolder, MockPlatform, SentKind, SentMessage};
pub use recording_control::RecordingControl;
