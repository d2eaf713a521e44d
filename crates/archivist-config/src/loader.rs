// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `/etc/archivist/archivist.toml`, then
//! `~/.config/archivist/archivist.toml`, then `./archivist.toml`, then
//! `ARCHIVIST_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ArchivistConfig;

/// Config file name searched in every location.
pub const CONFIG_FILE: &str = "archivist.toml";

/// Sections recognised in environment variable names.
const ENV_SECTIONS: [&str; 8] = [
    "service", "platform", "control", "gateway", "storage", "sessions", "archive", "limits",
];

/// System-wide, user, and local config paths, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/archivist").join(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("archivist").join(CONFIG_FILE));
    }
    paths.push(PathBuf::from(CONFIG_FILE));
    paths
}

/// Build the full layered Figment (defaults, every config file, env vars).
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(ArchivistConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<ArchivistConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string over compiled defaults.
///
/// Environment variables are not consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<ArchivistConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ArchivistConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ArchivistConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ArchivistConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Maps `ARCHIVIST_<SECTION>_<KEY>` onto `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `ARCHIVIST_CONTROL_BOT_TOKEN` is `control.bot_token`, not `control.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("ARCHIVIST_").map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_once_after_section() {
        assert_eq!(map_env_key("control_bot_token"), "control.bot_token");
        assert_eq!(map_env_key("platform_api_hash"), "platform.api_hash");
        assert_eq!(
            map_env_key("archive_media_group_window_ms"),
            "archive.media_group_window_ms"
        );
        assert_eq!(map_env_key("unknown_thing"), "unknown_thing");
    }

    #[test]
    fn local_file_has_highest_file_precedence() {
        let paths = config_paths();
        assert_eq!(
            paths.first(),
            Some(&PathBuf::from("/etc/archivist/archivist.toml"))
        );
        assert_eq!(paths.last(), Some(&PathBuf::from(CONFIG_FILE)));
    }
}
