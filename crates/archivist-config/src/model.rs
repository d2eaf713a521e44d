// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Archivist configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArchivistConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Platform SDK bridge settings.
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Owner-facing control bot.
    #[serde(default)]
    pub control: ControlConfig,

    /// HTTP control API.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// SQLite document store.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential files.
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Archive pipeline tuning.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Outbound rate limiting and throttle backoff.
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "archivist".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform SDK bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Base URL of the SDK sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Application id issued by the platform.
    #[serde(default)]
    pub api_id: Option<i64>,

    /// Application hash issued by the platform.
    #[serde(default)]
    pub api_hash: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Long-poll timeout for the update stream.
    #[serde(default = "default_updates_poll_secs")]
    pub updates_poll_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            api_id: None,
            api_hash: None,
            request_timeout_secs: default_request_timeout_secs(),
            updates_poll_secs: default_updates_poll_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8099".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_updates_poll_secs() -> u64 {
    30
}

/// Control bot configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    /// Bot API token from BotFather.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// HTTP control API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on every control route. Without it every
    /// authenticated route is rejected.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3080
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for concurrent reads.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("archivist").join("archivist.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("archivist.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Credential file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionsConfig {
    /// Directory holding one `user_<id>.json` per owner.
    #[serde(default = "default_sessions_dir")]
    pub dir: String,

    /// Legacy single-file session map, migrated on startup if present.
    #[serde(default = "default_legacy_file")]
    pub legacy_file: String,

    /// Credentials unused for this many days are removed by `sessions cleanup`.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
            legacy_file: default_legacy_file(),
            stale_after_days: default_stale_after_days(),
        }
    }
}

fn default_sessions_dir() -> String {
    "./sessions".to_string()
}

fn default_legacy_file() -> String {
    "./session.json".to_string()
}

fn default_stale_after_days() -> u32 {
    30
}

/// Archive pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Scratch directory for downloaded media.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    /// Durable copies of media from tracked contacts.
    #[serde(default = "default_retained_dir")]
    pub retained_dir: String,

    /// JSON allow-list of contacts that get queryable archive entries.
    #[serde(default = "default_tracking_file")]
    pub tracking_file: String,

    /// How long to collect siblings of a media group before forwarding.
    #[serde(default = "default_media_group_window_ms")]
    pub media_group_window_ms: u64,

    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,

    /// Linear backoff step between download attempts.
    #[serde(default = "default_download_backoff_secs")]
    pub download_backoff_secs: u64,

    /// Folder that collects the owner's private-chat destinations.
    #[serde(default = "default_personal_folder_title")]
    pub personal_folder_title: String,

    /// Folder slots at or above this id are never used.
    #[serde(default = "default_max_folder_id")]
    pub max_folder_id: i32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            retained_dir: default_retained_dir(),
            tracking_file: default_tracking_file(),
            media_group_window_ms: default_media_group_window_ms(),
            download_attempts: default_download_attempts(),
            download_backoff_secs: default_download_backoff_secs(),
            personal_folder_title: default_personal_folder_title(),
            max_folder_id: default_max_folder_id(),
        }
    }
}

fn default_media_dir() -> String {
    "./archives_media".to_string()
}

fn default_retained_dir() -> String {
    "./target_archives".to_string()
}

fn default_tracking_file() -> String {
    "./target_ids.json".to_string()
}

fn default_media_group_window_ms() -> u64 {
    1000
}

fn default_download_attempts() -> u32 {
    3
}

fn default_download_backoff_secs() -> u64 {
    2
}

fn default_personal_folder_title() -> String {
    "Oblivion".to_string()
}

fn default_max_folder_id() -> i32 {
    100
}

/// Outbound rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Length of the per-owner rate window.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Operations allowed per owner per window.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Total attempts for an operation that keeps hitting flood waits.
    #[serde(default = "default_throttle_attempts")]
    pub throttle_attempts: u32,

    /// Multiplier applied to the platform's requested wait.
    #[serde(default = "default_throttle_margin")]
    pub throttle_margin: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            capacity: default_capacity(),
            throttle_attempts: default_throttle_attempts(),
            throttle_margin: default_throttle_margin(),
        }
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_capacity() -> u32 {
    25
}

fn default_throttle_attempts() -> u32 {
    3
}

fn default_throttle_margin() -> f64 {
    1.1
}
