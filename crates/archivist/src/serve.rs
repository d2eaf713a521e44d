// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `archivist serve`: wires every component and runs until a shutdown signal.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use archivist_archive::{ArchivePipeline, TrackingRegistry};
use archivist_bridge::BridgeConnector;
use archivist_config::ArchivistConfig;
use archivist_core::{ArchiveStore, ArchivistError, HealthStatus, PluginAdapter, SessionRegistry};
use archivist_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig};
use archivist_prometheus::PrometheusAdapter;
use archivist_resilience::{CircuitBreaker, Dispatcher};
use archivist_session::{CredentialStore, LoginCoordinator, Supervisor};
use archivist_storage::SqliteStore;
use archivist_telegram::TelegramControl;

use crate::shutdown;

pub async fn run_serve(config: ArchivistConfig) -> Result<(), ArchivistError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, "starting archivist serve");

    let prometheus = match PrometheusAdapter::new() {
        Ok(adapter) => Some(Arc::new(adapter)),
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    };

    let sqlite = Arc::new(SqliteStore::open(&config.storage).await?);
    let store: Arc<dyn ArchiveStore> = sqlite.clone();

    let credentials = Arc::new(CredentialStore::new(&config.sessions.dir));
    let migrated = credentials
        .migrate_legacy(Path::new(&config.sessions.legacy_file))
        .await?;
    if migrated > 0 {
        info!(migrated, "legacy credentials converted");
    }
    let loaded = credentials.load().await?;
    info!(count = loaded, "credentials loaded");

    let connector = Arc::new(BridgeConnector::new(&config.platform)?);
    let control = Arc::new(TelegramControl::new(&config.control)?);

    let mut adapters: Vec<Arc<dyn PluginAdapter>> =
        vec![sqlite, connector.clone(), control.clone()];
    if let Some(prometheus) = &prometheus {
        adapters.push(prometheus.clone());
    }
    check_adapters(&adapters).await;

    let breaker = CircuitBreaker::new();
    let dispatcher = Arc::new(Dispatcher::from_config(&config.limits, breaker.clone()));
    let registry = Arc::new(SessionRegistry::new());
    let tracking = Arc::new(TrackingRegistry::open(&config.archive.tracking_file).await);
    info!(
        tracked = tracking.entries().await.len(),
        unresolved = tracking.unresolved().await.len(),
        "tracking list loaded"
    );

    let pipeline = Arc::new(ArchivePipeline::new(
        &config.archive,
        store.clone(),
        dispatcher.clone(),
        registry.clone(),
        control.clone(),
        tracking,
    ));

    let supervisor = Supervisor::new(
        registry,
        connector.clone(),
        credentials.clone(),
        store.clone(),
        control.clone(),
        pipeline,
        dispatcher.clone(),
    );
    let logins = LoginCoordinator::new(
        connector,
        credentials,
        store.clone(),
        control,
        supervisor.clone(),
    );

    let cancel = shutdown::install_signal_handler();
    shutdown::install_resume_handler(breaker, cancel.clone());

    let report = supervisor.start_all().await;
    info!(
        started = report.started.len(),
        failed = report.failed.len(),
        "stored sessions started"
    );
    for (owner, reason) in &report.failed {
        warn!(owner_id = %owner, reason = %reason, "session not started");
    }

    let gateway = if config.gateway.enabled {
        let prometheus_render = prometheus.clone().map(|p| {
            let render: Arc<dyn Fn() -> String + Send + Sync> = Arc::new(move || p.render());
            render
        });
        let state = GatewayState {
            logins,
            supervisor: supervisor.clone(),
            store,
            dispatcher,
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            health: HealthState {
                start_time: Instant::now(),
                prometheus_render,
            },
        };
        if config.gateway.bearer_token.is_none() {
            warn!("gateway.bearer_token is not set; every control route will be rejected");
        }
        let server_config = ServerConfig::from(&config.gateway);
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            archivist_gateway::start_server(&server_config, state, gateway_cancel).await
        }))
    } else {
        info!("gateway disabled");
        None
    };

    cancel.cancelled().await;

    supervisor.shutdown().await;
    if let Some(handle) = gateway {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "gateway failed"),
            Err(e) => error!(error = %e, "gateway task panicked"),
        }
    }
    for adapter in &adapters {
        if let Err(e) = adapter.shutdown().await {
            warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
        }
    }

    info!("archivist serve shutdown complete");
    Ok(())
}

/// Logs each adapter's health. Startup continues regardless; sessions whose
/// backend is down fail individually.
async fn check_adapters(adapters: &[Arc<dyn PluginAdapter>]) {
    for adapter in adapters {
        match adapter.health_check().await {
            Ok(HealthStatus::Healthy) => {
                info!(adapter = adapter.name(), kind = %adapter.adapter_type(), "adapter healthy")
            }
            Ok(HealthStatus::Degraded(reason)) => {
                warn!(adapter = adapter.name(), reason = %reason, "adapter degraded")
            }
            Ok(HealthStatus::Unhealthy(reason)) => {
                warn!(adapter = adapter.name(), reason = %reason, "adapter unhealthy")
            }
            Err(e) => warn!(adapter = adapter.name(), error = %e, "health check failed"),
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("archivist={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
