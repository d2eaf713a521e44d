// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter speaking JSON over HTTP to the platform SDK sidecar.
//!
//! [`BridgeConnector`] drives logins and opens sessions; each open session
//! is a [`BridgeClient`] implementing
//! [`PlatformClient`](archivist_core::PlatformClient). Sidecar failures are
//! classified into [`PlatformError`](archivist_core::PlatformError) so the
//! dispatcher and supervisor can react to throttling and revocation.

pub mod client;
pub mod connector;
mod http;
pub mod wire;

pub use client::BridgeClient;
pub use connector::BridgeConnector;
