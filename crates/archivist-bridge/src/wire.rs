// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON bodies exchanged with the sidecar.

use serde::{Deserialize, Serialize};

use archivist_core::types::UserProfile;

/// App credentials forwarded on login and connect when configured.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginStart<'a> {
    pub phone: &'a str,
    #[serde(flatten)]
    pub app: &'a AppCredentials,
}

#[derive(Debug, Deserialize)]
pub struct LoginStarted {
    pub login_id: String,
}

#[derive(Debug, Serialize)]
pub struct LoginCode<'a> {
    pub code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LoginPassword<'a> {
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    Ok,
    PasswordRequired,
}

/// Answer to a code or password step.
#[derive(Debug, Deserialize)]
pub struct LoginStep {
    pub status: LoginStatus,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub account: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct Connect<'a> {
    pub session: &'a str,
    #[serde(flatten)]
    pub app: &'a AppCredentials,
}

#[derive(Debug, Deserialize)]
pub struct Connected {
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Uploaded {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RpcFailure {
    pub code: i32,
    pub message: String,
}

/// Every session-scoped response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcFailure>,
}

/// Error body of a non-2xx response outside an envelope.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: RpcFailure,
}
