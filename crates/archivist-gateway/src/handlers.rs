// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers for the control API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use archivist_core::types::ArchiveEntry;
use archivist_core::{ArchivistError, ConnectivityState, UserId};
use archivist_session::LoginStage;

use crate::server::GatewayState;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps service errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub ArchivistError);

impl From<ArchivistError> for ApiError {
    fn from(e: ArchivistError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ArchivistError::NotFound(_) => StatusCode::NOT_FOUND,
            ArchivistError::Handshake(_) => StatusCode::CONFLICT,
            ArchivistError::Config(_) => StatusCode::BAD_REQUEST,
            ArchivistError::PlatformBlocked => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "control request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

/// A digit, `backspace`, or `submit`.
#[derive(Debug, Deserialize)]
pub struct CodeInput {
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginStatusResponse {
    pub stage: LoginStage,
    /// Masked code accumulated so far.
    pub display: String,
}

#[derive(Debug, Serialize)]
pub struct CodeDisplay {
    pub display: String,
}

#[derive(Debug, Serialize)]
pub struct Outcome {
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub owner_id: UserId,
    pub live: bool,
    pub state: Option<ConnectivityState>,
    pub pending: usize,
    pub used_in_window: u32,
    pub paused: bool,
}

#[derive(Debug, Serialize)]
pub struct TrafficResponse {
    pub blocked: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub live_sessions: usize,
}

/// GET /health (unauthenticated).
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        live_sessions: state.supervisor.registry().len(),
    })
}

/// GET /metrics (unauthenticated). 404 when no exporter is installed.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /v1/owners/{id}/login
///
/// Starts the handshake, or reports the attempt already in progress.
pub async fn post_login(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
    Json(body): Json<LoginRequest>,
) -> (StatusCode, Json<LoginStatusResponse>) {
    let attempt = state.logins.begin(UserId(owner), body.phone);
    (
        StatusCode::ACCEPTED,
        Json(LoginStatusResponse {
            stage: attempt.stage(),
            display: attempt.code_display(),
        }),
    )
}

/// GET /v1/owners/{id}/login
pub async fn get_login(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
) -> Result<Json<LoginStatusResponse>, ApiError> {
    let attempt = state.logins.attempt(UserId(owner)).ok_or_else(|| {
        ArchivistError::NotFound(format!("no login in progress for owner {owner}"))
    })?;
    Ok(Json(LoginStatusResponse {
        stage: attempt.stage(),
        display: attempt.code_display(),
    }))
}

/// POST /v1/owners/{id}/login/phone
pub async fn post_login_phone(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
    Json(body): Json<PhoneRequest>,
) -> Result<StatusCode, ApiError> {
    state.logins.supply_phone(UserId(owner), body.phone).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/owners/{id}/login/code
pub async fn post_login_code(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
    Json(body): Json<CodeInput>,
) -> Result<Json<CodeDisplay>, ApiError> {
    let display = state
        .logins
        .append_code_digit(UserId(owner), &body.input)
        .await?;
    Ok(Json(CodeDisplay { display }))
}

/// GET /v1/owners/{id}/login/code
pub async fn get_login_code(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
) -> Json<CodeDisplay> {
    Json(CodeDisplay {
        display: state.logins.current_code_display(UserId(owner)),
    })
}

/// POST /v1/owners/{id}/login/password
pub async fn post_login_password(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
    Json(body): Json<PasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .logins
        .supply_password(UserId(owner), body.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/owners/{id}/login
pub async fn delete_login(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
) -> Json<Outcome> {
    Json(Outcome {
        changed: state.logins.cleanup(UserId(owner)),
    })
}

/// GET /v1/owners/{id}/session
pub async fn get_session(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
) -> Json<SessionResponse> {
    let owner = UserId(owner);
    let lane = state.dispatcher.stats(owner);
    Json(SessionResponse {
        owner_id: owner,
        live: state.supervisor.get(owner).is_some(),
        state: state.supervisor.state(owner),
        pending: lane.pending,
        used_in_window: lane.used_in_window,
        paused: lane.paused,
    })
}

/// DELETE /v1/owners/{id}/session
///
/// Stops archiving for the owner and closes the live connection.
pub async fn delete_session(
    State(state): State<GatewayState>,
    Path(owner): Path<i64>,
) -> Json<Outcome> {
    Json(Outcome {
        changed: state.supervisor.stop(UserId(owner)).await,
    })
}

/// GET /v1/owners/{id}/archive/{contact}
pub async fn get_archive(
    State(state): State<GatewayState>,
    Path((owner, contact)): Path<(i64, i64)>,
) -> Result<Json<Vec<ArchiveEntry>>, ApiError> {
    let entries = state
        .store
        .entries_for(UserId(owner), UserId(contact))
        .await?;
    Ok(Json(entries))
}

/// GET /v1/traffic
pub async fn get_traffic(State(state): State<GatewayState>) -> Json<TrafficResponse> {
    Json(TrafficResponse {
        blocked: state.dispatcher.breaker().is_tripped(),
    })
}

/// POST /v1/traffic/resume
///
/// Closes the circuit breaker after the operator has dealt with the block.
pub async fn post_traffic_resume(State(state): State<GatewayState>) -> Json<Outcome> {
    Json(Outcome {
        changed: state.dispatcher.breaker().resume(),
    })
}
