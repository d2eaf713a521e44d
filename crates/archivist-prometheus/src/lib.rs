// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Archivist service.
//!
//! Components record through the helpers in [`recording`]; the binary
//! installs the exporter and the gateway renders it at `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use archivist_core::{AdapterType, ArchivistError, HealthStatus, PluginAdapter};

pub use recording::{
    DeliveryMode, record_archived, record_circuit_trip, record_fanout, record_session_end,
    record_throttle_retry, set_live_sessions,
};

/// Installed Prometheus recorder.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the recorder globally. Fails if a recorder is already installed.
    pub fn new() -> Result<Self, ArchivistError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            ArchivistError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;
        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");
        Ok(Self { handle })
    }

    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }

    /// All collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, ArchivistError> {
        Ok(HealthStatus::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_archived(DeliveryMode::Forwarded);
        record_throttle_retry();
        record_session_end("SESSION_REVOKED");
        record_fanout("live");
        set_live_sessions(3);
    }

    #[test]
    fn rendered_output_contains_recorded_counter() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_archived(DeliveryMode::Reconstructed);
            record_archived(DeliveryMode::Reconstructed);
        });
        let text = handle.render();
        assert!(text.contains("archivist_messages_archived_total"));
        assert!(text.contains("mode=\"reconstructed\""));
    }
}
