// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archivist: archives the private and group conversations of consenting
//! owners into per-contact channels and fans them out to monitoring parents.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod sessions;
mod shutdown;
mod status;
mod tracking;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use archivist_config::ArchivistConfig;
use archivist_core::ArchivistError;

#[derive(Parser, Debug)]
#[command(name = "archivist", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the archiving service.
    Serve,
    /// Query a running service's health endpoint.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect and maintain stored owner credentials.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Edit the contact tracking allow-list.
    Tracking {
        #[command(subcommand)]
        action: TrackingAction,
    },
    /// Validate or print the effective configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum SessionsAction {
    /// List stored credentials.
    List,
    /// Convert the legacy single-file credential map into per-owner files.
    Migrate {
        /// Legacy file; defaults to `sessions.legacy_file`.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Delete credentials unused for longer than the given number of days.
    Cleanup {
        /// Defaults to `sessions.stale_after_days`.
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum TrackingAction {
    List,
    /// Track a contact by id.
    Add {
        id: i64,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Remove {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Load and validate; exits non-zero on the first run of errors.
    Check,
    /// Print the effective configuration as TOML.
    Show,
}

fn load(path: Option<&std::path::Path>) -> ArchivistConfig {
    let loaded = match path {
        Some(path) => archivist_config::load_and_validate_path(path),
        None => archivist_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            archivist_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load(cli.config.as_deref());

    let result: Result<(), ArchivistError> = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Status { json } => status::run_status(&config, json).await,
        Commands::Sessions { action } => match action {
            SessionsAction::List => sessions::run_list(&config).await,
            SessionsAction::Migrate { file } => {
                sessions::run_migrate(&config, file.as_deref()).await
            }
            SessionsAction::Cleanup { days } => sessions::run_cleanup(&config, days).await,
        },
        Commands::Tracking { action } => match action {
            TrackingAction::List => tracking::run_list(&config).await,
            TrackingAction::Add {
                id,
                username,
                phone,
            } => tracking::run_add(&config, id, username.as_deref(), phone.as_deref()).await,
            TrackingAction::Remove { id } => tracking::run_remove(&config, id).await,
        },
        Commands::Config { action } => match action {
            ConfigAction::Check => {
                println!("archivist: configuration is valid");
                Ok(())
            }
            ConfigAction::Show => archivist_config::render_toml(&config)
                .map(|toml| print!("{toml}"))
                .map_err(|e| ArchivistError::Internal(format!("cannot render config: {e}"))),
        },
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sessions_cleanup_with_days() {
        let cli = Cli::try_parse_from(["archivist", "sessions", "cleanup", "--days", "7"]).unwrap();
        match cli.command {
            Commands::Sessions {
                action: SessionsAction::Cleanup { days },
            } => assert_eq!(days, Some(7)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_path_is_global() {
        let cli =
            Cli::try_parse_from(["archivist", "config", "check", "--config", "/tmp/a.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.toml")));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["archivist"]).is_err());
    }

    #[test]
    fn defaults_load_without_a_file() {
        let config = archivist_config::load_and_validate_str("").unwrap();
        assert_eq!(config.service.name, "archivist");
    }
}
