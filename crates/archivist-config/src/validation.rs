// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express.
//! Every problem is collected before returning.

use crate::diagnostic::ConfigError;
use crate::model::ArchivistConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(errors: &mut Vec<ConfigError>, message: String) {
    errors.push(ConfigError::Validation { message });
}

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ArchivistConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.service.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        invalid(
            &mut errors,
            format!(
                "service.log_level `{}` must be one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    let url = config.platform.bridge_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        invalid(
            &mut errors,
            format!("platform.bridge_url `{url}` must be an http(s) URL"),
        );
    }
    if config.platform.request_timeout_secs == 0 {
        invalid(
            &mut errors,
            "platform.request_timeout_secs must be greater than 0".to_string(),
        );
    }

    if config.gateway.enabled {
        if config.gateway.port == 0 {
            invalid(&mut errors, "gateway.port must not be 0".to_string());
        }
        let host = config.gateway.host.trim();
        if host.parse::<std::net::IpAddr>().is_err() && host != "localhost" {
            invalid(
                &mut errors,
                format!(
                    "gateway.host `{}` is not a valid IP address",
                    config.gateway.host
                ),
            );
        }
    }

    for (key, value) in [
        ("storage.database_path", &config.storage.database_path),
        ("sessions.dir", &config.sessions.dir),
        ("archive.media_dir", &config.archive.media_dir),
        ("archive.retained_dir", &config.archive.retained_dir),
        ("archive.tracking_file", &config.archive.tracking_file),
    ] {
        if value.trim().is_empty() {
            invalid(&mut errors, format!("{key} must not be empty"));
        }
    }

    if config.archive.download_attempts == 0 {
        invalid(
            &mut errors,
            "archive.download_attempts must be at least 1".to_string(),
        );
    }
    if !(3..=255).contains(&config.archive.max_folder_id) {
        invalid(
            &mut errors,
            format!(
                "archive.max_folder_id must be between 3 and 255, got {}",
                config.archive.max_folder_id
            ),
        );
    }

    if config.limits.window_secs == 0 {
        invalid(
            &mut errors,
            "limits.window_secs must be greater than 0".to_string(),
        );
    }
    if config.limits.capacity == 0 {
        invalid(
            &mut errors,
            "limits.capacity must be greater than 0".to_string(),
        );
    }
    if config.limits.throttle_attempts == 0 {
        invalid(
            &mut errors,
            "limits.throttle_attempts must be at least 1".to_string(),
        );
    }
    let margin = config.limits.throttle_margin;
    if margin.is_nan() || margin < 1.0 {
        invalid(
            &mut errors,
            format!(
                "limits.throttle_margin must be at least 1.0, got {margin}"
            ),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ArchivistConfig::default()).is_ok());
    }

    #[test]
    fn all_problems_are_collected() {
        let mut config = ArchivistConfig::default();
        config.service.log_level = "loud".into();
        config.limits.capacity = 0;
        config.limits.throttle_margin = 0.5;
        config.archive.media_dir = "  ".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        let text: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(text.iter().any(|t| t.contains("service.log_level")));
        assert!(text.iter().any(|t| t.contains("limits.capacity")));
        assert!(text.iter().any(|t| t.contains("limits.throttle_margin")));
        assert!(text.iter().any(|t| t.contains("archive.media_dir")));
    }

    #[test]
    fn nan_margin_is_rejected() {
        let mut config = ArchivistConfig::default();
        config.limits.throttle_margin = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn disabled_gateway_skips_network_checks() {
        let mut config = ArchivistConfig::default();
        config.gateway.enabled = false;
        config.gateway.port = 0;
        config.gateway.host = "not an ip".into();
        assert!(validate_config(&config).is_ok());
    }
}
