// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing and error classification for sidecar calls.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use archivist_core::PlatformError;

use crate::wire::{Envelope, ErrorBody};

/// A `reqwest` client bound to the sidecar's base URL.
#[derive(Debug, Clone)]
pub struct BridgeHttp {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeHttp {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// POSTs `body` and decodes a plain (non-envelope) JSON answer.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, PlatformError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| PlatformError::Transport(format!("malformed sidecar response: {e}")))
    }
}

pub(crate) fn transport(e: reqwest::Error) -> PlatformError {
    PlatformError::Transport(e.to_string())
}

/// Passes 2xx responses through; classifies everything else.
pub(crate) async fn check_status(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PlatformError::TooManyRequests);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(status = %status, body = %body, "sidecar returned an error status");
    Err(match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => PlatformError::from_rpc(parsed.error.code, parsed.error.message),
        Err(_) => PlatformError::from_rpc(i32::from(status.as_u16()), body),
    })
}

/// Unwraps an RPC envelope into its typed result. A missing result decodes
/// from `null`, which covers unit and optional results.
pub(crate) fn open_envelope<R: DeserializeOwned>(
    envelope: Envelope<Value>,
) -> Result<R, PlatformError> {
    if !envelope.ok {
        return Err(match envelope.error {
            Some(failure) => PlatformError::from_rpc(failure.code, failure.message),
            None => PlatformError::Rpc {
                code: 500,
                message: "sidecar reported failure without details".into(),
            },
        });
    }
    serde_json::from_value(envelope.result.unwrap_or(Value::Null))
        .map_err(|e| PlatformError::Transport(format!("unexpected RPC result shape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::types::UserProfile;

    fn envelope(raw: &str) -> Envelope<Value> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn null_result_decodes_as_none_or_unit() {
        let none: Option<UserProfile> =
            open_envelope(envelope(r#"{"ok": true, "result": null}"#)).unwrap();
        assert!(none.is_none());
        open_envelope::<()>(envelope(r#"{"ok": true}"#)).unwrap();
    }

    #[test]
    fn failures_are_classified() {
        let err = open_envelope::<()>(envelope(
            r#"{"ok": false, "error": {"code": 401, "message": "AUTH_KEY_UNREGISTERED"}}"#,
        ))
        .unwrap_err();
        assert!(err.is_revocation());

        let err = open_envelope::<()>(envelope(
            r#"{"ok": false, "error": {"code": 420, "message": "FLOOD_WAIT_12"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err, PlatformError::FloodWait { seconds: 12 });

        let err = open_envelope::<()>(envelope(r#"{"ok": false}"#)).unwrap_err();
        assert!(matches!(err, PlatformError::Rpc { code: 500, .. }));
    }

    #[test]
    fn wrong_shape_is_a_transport_error() {
        let err = open_envelope::<i32>(envelope(r#"{"ok": true, "result": "x"}"#)).unwrap_err();
        assert!(matches!(err, PlatformError::Transport(_)));
    }
}
