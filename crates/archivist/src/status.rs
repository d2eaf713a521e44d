// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `archivist status`: asks a running service's gateway for its health.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use archivist_config::ArchivistConfig;
use archivist_core::ArchivistError;

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
    version: String,
    uptime_secs: u64,
    live_sessions: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusReport {
    pub running: bool,
    pub endpoint: String,
    pub version: Option<String>,
    pub uptime: Option<String>,
    pub live_sessions: Option<usize>,
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    match (days, hours) {
        (0, 0) => format!("{minutes}m"),
        (0, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h {minutes}m"),
    }
}

/// Any failure to reach or parse the endpoint reports "not running".
pub async fn fetch_status(endpoint: &str) -> Result<StatusReport, ArchivistError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| ArchivistError::Internal(format!("failed to create HTTP client: {e}")))?;

    let offline = StatusReport {
        running: false,
        endpoint: endpoint.to_string(),
        version: None,
        uptime: None,
        live_sessions: None,
    };

    let response = match client.get(endpoint).send().await {
        Ok(response) if response.status().is_success() => response,
        _ => return Ok(offline),
    };
    let Ok(body) = response.json::<HealthBody>().await else {
        return Ok(offline);
    };

    Ok(StatusReport {
        running: body.status == "ok",
        endpoint: endpoint.to_string(),
        version: Some(body.version),
        uptime: Some(format_uptime(body.uptime_secs)),
        live_sessions: Some(body.live_sessions),
    })
}

pub async fn run_status(config: &ArchivistConfig, json: bool) -> Result<(), ArchivistError> {
    let endpoint = format!(
        "http://{}:{}/health",
        config.gateway.host, config.gateway.port
    );
    let report = fetch_status(&endpoint).await?;

    if json {
        let text = serde_json::to_string_pretty(&report)?;
        println!("{text}");
        return Ok(());
    }

    println!();
    println!("  archivist status");
    println!("  {}", "-".repeat(35));
    if report.running {
        println!(
            "    State:    [OK] running {} (uptime: {})",
            report.version.as_deref().unwrap_or("?"),
            report.uptime.as_deref().unwrap_or("?")
        );
        println!(
            "    Sessions: {} live",
            report.live_sessions.unwrap_or_default()
        );
    } else {
        println!("    State:    [FAIL] not running");
        println!("    Endpoint: {}", report.endpoint);
        println!();
        println!("  Start with: archivist serve");
    }
    println!();
    Ok(())
}
