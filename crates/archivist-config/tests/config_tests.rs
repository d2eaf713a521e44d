// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading.

use archivist_config::diagnostic::ConfigError;
use archivist_config::model::ArchivistConfig;
use archivist_config::{
    load_and_validate_path, load_and_validate_str, load_config, load_config_from_str, render_toml,
};

#[test]
fn full_file_deserializes() {
    let toml = r#"
[service]
name = "archive-node"
log_level = "debug"

[platform]
bridge_url = "http://10.0.0.5:8099"
api_id = 12345
api_hash = "abcdef"

[control]
bot_token = "123:ABC"

[gateway]
port = 9000
bearer_token = "secret"

[sessions]
dir = "/var/lib/archivist/sessions"
stale_after_days = 14

[archive]
media_group_window_ms = 1500
personal_folder_title = "Vault"

[limits]
capacity = 10
window_secs = 30
throttle_margin = 1.25
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "archive-node");
    assert_eq!(config.platform.api_id, Some(12345));
    assert_eq!(config.control.bot_token.as_deref(), Some("123:ABC"));
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.sessions.stale_after_days, 14);
    assert_eq!(config.archive.media_group_window_ms, 1500);
    assert_eq!(config.archive.personal_folder_title, "Vault");
    assert_eq!(config.limits.capacity, 10);
    assert_eq!(config.limits.throttle_margin, 1.25);
    // Untouched keys keep their defaults.
    assert_eq!(config.archive.download_attempts, 3);
    assert_eq!(config.limits.throttle_attempts, 3);
}

#[test]
fn empty_input_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.limits.window_secs, 60);
    assert_eq!(config.limits.capacity, 25);
    assert_eq!(config.archive.media_dir, "./archives_media");
    assert_eq!(config.sessions.legacy_file, "./session.json");
    assert!(config.gateway.bearer_token.is_none());
}

#[test]
fn unknown_key_gets_suggestion_and_span() {
    let toml = "[limits]\ncapacty = 5\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "capacty");
            assert_eq!(suggestion.as_deref(), Some("capacity"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[limits]\ncapacity = \"many\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "limits.capacity"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn validation_runs_after_parsing() {
    let errors = load_and_validate_str("[limits]\ncapacity = 0\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[service]\nname = \"from-file\"\n").unwrap();
    let config = load_and_validate_path(&path).unwrap();
    assert_eq!(config.service.name, "from-file");
}

#[test]
fn env_overrides_files() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("archivist.toml", "[control]\nbot_token = \"from-file\"\n")?;
        jail.set_env("ARCHIVIST_CONTROL_BOT_TOKEN", "from-env");
        jail.set_env("ARCHIVIST_LIMITS_CAPACITY", "7");
        jail.set_env("ARCHIVIST_ARCHIVE_MEDIA_GROUP_WINDOW_MS", "250");

        let config = load_config().expect("config should load");
        assert_eq!(config.control.bot_token.as_deref(), Some("from-env"));
        assert_eq!(config.limits.capacity, 7);
        assert_eq!(config.archive.media_group_window_ms, 250);
        Ok(())
    });
}

#[test]
fn rendered_defaults_load_back() {
    let rendered = render_toml(&ArchivistConfig::default()).unwrap();
    let config = load_config_from_str(&rendered).unwrap();
    assert_eq!(config.service.name, "archivist");
    assert_eq!(config.archive.max_folder_id, 100);
}
