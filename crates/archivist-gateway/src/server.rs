// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control API server built on axum.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use archivist_config::model::GatewayConfig;
use archivist_core::{ArchiveStore, ArchivistError};
use archivist_resilience::Dispatcher;
use archivist_session::{LoginCoordinator, Supervisor};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// State for the unauthenticated health and metrics routes.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    /// Renders the Prometheus exposition, when an exporter is installed.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub logins: Arc<LoginCoordinator>,
    pub supervisor: Arc<Supervisor>,
    pub store: Arc<dyn ArchiveStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Builds the full route table.
///
/// `/health` and `/metrics` are public; everything under `/v1` requires the
/// bearer token.
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/v1/owners/{id}/login",
            post(handlers::post_login)
                .get(handlers::get_login)
                .delete(handlers::delete_login),
        )
        .route(
            "/v1/owners/{id}/login/phone",
            post(handlers::post_login_phone),
        )
        .route(
            "/v1/owners/{id}/login/code",
            post(handlers::post_login_code).get(handlers::get_login_code),
        )
        .route(
            "/v1/owners/{id}/login/password",
            post(handlers::post_login_password),
        )
        .route(
            "/v1/owners/{id}/session",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/v1/owners/{id}/archive/{contact}",
            get(handlers::get_archive),
        )
        .route("/v1/traffic", get(handlers::get_traffic))
        .route("/v1/traffic/resume", post(handlers::post_traffic_resume))
        .route_layer(axum_middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serves the control API until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ArchivistError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ArchivistError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ArchivistError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
