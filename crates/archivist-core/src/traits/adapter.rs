// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and health shared by every external collaborator.

use async_trait::async_trait;

use crate::error::ArchivistError;
use crate::types::{AdapterType, HealthStatus};

/// Implemented by the platform bridge, the store, the control bot, and the
/// metrics exporter so `serve` can check them at startup and release them on
/// exit.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short stable name used in logs, e.g. `"bridge"`.
    fn name(&self) -> &str;

    fn adapter_type(&self) -> AdapterType;

    /// Checks the backing service. Transport failures are reported as
    /// [`HealthStatus::Unhealthy`], not as errors.
    async fn health_check(&self) -> Result<HealthStatus, ArchivistError>;

    /// Releases held resources. Idempotent.
    async fn shutdown(&self) -> Result<(), ArchivistError> {
        Ok(())
    }
}
