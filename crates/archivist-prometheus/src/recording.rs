// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade, so calls are no-ops until a recorder is
//! installed.

use metrics::{describe_counter, describe_gauge};

/// Register all metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "archivist_messages_archived_total",
        "Messages delivered to an archive destination, by delivery mode"
    );
    describe_counter!(
        "archivist_throttle_retries_total",
        "Flood-wait retries performed by the backoff helper"
    );
    describe_counter!(
        "archivist_circuit_trips_total",
        "Times the platform-wide circuit breaker was tripped"
    );
    describe_counter!(
        "archivist_sessions_revoked_total",
        "Owner sessions torn down, by reason"
    );
    describe_counter!(
        "archivist_fanout_deliveries_total",
        "Monitoring fan-out deliveries, by path"
    );
    describe_gauge!(
        "archivist_live_sessions",
        "Currently connected owner sessions"
    );
}

/// How a message reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Forwarded,
    Reconstructed,
}

pub fn record_archived(mode: DeliveryMode) {
    let mode = match mode {
        DeliveryMode::Forwarded => "forwarded",
        DeliveryMode::Reconstructed => "reconstructed",
    };
    metrics::counter!("archivist_messages_archived_total", "mode" => mode).increment(1);
}

pub fn record_throttle_retry() {
    metrics::counter!("archivist_throttle_retries_total").increment(1);
}

pub fn record_circuit_trip() {
    metrics::counter!("archivist_circuit_trips_total").increment(1);
}

pub fn record_session_end(reason: &str) {
    metrics::counter!("archivist_sessions_revoked_total", "reason" => reason.to_string())
        .increment(1);
}

/// `path` is `live` (subscriber session) or `fallback` (control notification).
pub fn record_fanout(path: &'static str) {
    metrics::counter!("archivist_fanout_deliveries_total", "path" => path).increment(1);
}

pub fn set_live_sessions(count: usize) {
    metrics::gauge!("archivist_live_sessions").set(count as f64);
}
