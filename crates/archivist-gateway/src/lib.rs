// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated HTTP control API.
//!
//! Operators drive owner logins, stop sessions, read archive entries, and
//! resume traffic after a platform block through these routes. The same
//! server exposes unauthenticated `/health` and `/metrics` endpoints.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, ServerConfig, build_router, start_server};
