// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session opening and the login handshake over the sidecar.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info};

use archivist_config::model::PlatformConfig;
use archivist_core::{
    AdapterType, ArchivistError, AuthenticatedAccount, HealthStatus, LoginPrompts, PlatformClient,
    PlatformConnector, PlatformError, PluginAdapter,
};

use crate::client::BridgeClient;
use crate::http::{BridgeHttp, check_status, open_envelope, transport};
use crate::wire::{
    AppCredentials, Connect, Connected, Envelope, LoginCode, LoginPassword, LoginStart,
    LoginStarted, LoginStatus, LoginStep,
};

/// Opens sessions on the platform SDK sidecar.
pub struct BridgeConnector {
    http: BridgeHttp,
    app: AppCredentials,
    poll: Duration,
}

impl BridgeConnector {
    pub fn new(config: &PlatformConfig) -> Result<Self, ArchivistError> {
        let http = BridgeHttp::new(
            &config.bridge_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self {
            http,
            app: AppCredentials {
                api_id: config.api_id,
                api_hash: config.api_hash.clone(),
            },
            poll: Duration::from_secs(config.updates_poll_secs),
        })
    }

    /// Follows the code step and, when two-step verification is on, the
    /// password step.
    async fn finish_login(
        &self,
        login_id: &str,
        prompts: &dyn LoginPrompts,
    ) -> Result<AuthenticatedAccount, ArchivistError> {
        let code = prompts.code().await?;
        let mut step: LoginStep = self
            .http
            .post(
                &format!("/v1/login/{login_id}/code"),
                &LoginCode { code: &code },
            )
            .await?;

        if step.status == LoginStatus::PasswordRequired {
            debug!(login_id, "two-step verification required");
            let password = SecretString::from(prompts.password(step.hint.take()).await?);
            step = self
                .http
                .post(
                    &format!("/v1/login/{login_id}/password"),
                    &LoginPassword {
                        password: password.expose_secret(),
                    },
                )
                .await?;
        }

        match step {
            LoginStep {
                status: LoginStatus::Ok,
                session: Some(session),
                account: Some(profile),
                ..
            } => {
                info!(user_id = %profile.id, "login handshake completed");
                Ok(AuthenticatedAccount {
                    profile,
                    session: SecretString::from(session),
                })
            }
            LoginStep {
                status: LoginStatus::PasswordRequired,
                ..
            } => Err(ArchivistError::Handshake("password was not accepted".into())),
            _ => Err(ArchivistError::Handshake("sidecar sent no session".into())),
        }
    }
}

#[async_trait]
impl PluginAdapter for BridgeConnector {
    fn name(&self) -> &str {
        "bridge"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, ArchivistError> {
        let status = match self.http.client().get(self.http.url("/health")).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => {
                HealthStatus::Degraded(format!("sidecar answered {}", response.status()))
            }
            Err(e) => HealthStatus::Unhealthy(format!("sidecar unreachable: {e}")),
        };
        Ok(status)
    }
}

#[async_trait]
impl PlatformConnector for BridgeConnector {
    async fn connect(
        &self,
        session: &SecretString,
    ) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        let body = Connect {
            session: session.expose_secret(),
            app: &self.app,
        };
        let response = self
            .http
            .client()
            .post(self.http.url("/v1/sessions/connect"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let envelope: Envelope<Value> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        let connected: Connected = open_envelope(envelope)?;
        debug!(client_id = %connected.client_id, "sidecar session opened");
        Ok(Arc::new(BridgeClient::new(self.http.clone(), connected.client_id, self.poll)))
    }

    async fn authenticate(
        &self,
        prompts: &dyn LoginPrompts,
    ) -> Result<AuthenticatedAccount, ArchivistError> {
        let phone = prompts.phone().await?;
        let started: LoginStarted = self
            .http
            .post(
                "/v1/login/start",
                &LoginStart {
                    phone: &phone,
                    app: &self.app,
                },
            )
            .await?;
        debug!(login_id = %started.login_id, "login started");
        self.finish_login(&started.login_id, prompts).await
    }
}
