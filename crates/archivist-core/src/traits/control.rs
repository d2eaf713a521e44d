// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-surface seam: the owner-facing bot the core notifies.

use async_trait::async_trait;

use crate::traits::adapter::PluginAdapter;
use crate::types::UserId;

/// Outbound notifications to users through the control surface.
///
/// Both operations are best effort. Implementations log delivery failures
/// instead of returning them.
#[async_trait]
pub trait ControlSurface: PluginAdapter {
    /// Fire-and-forget text notification.
    async fn notify(&self, user: UserId, text: &str);

    /// Display name as known to the control surface.
    async fn display_name(&self, user: UserId) -> Option<String>;
}
