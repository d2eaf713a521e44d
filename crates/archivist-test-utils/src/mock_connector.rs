// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock connector: hands out registered `MockPlatform`s by session token and
//! runs a scripted login handshake.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use archivist_core::types::UserProfile;
use archivist_core::{
    AdapterType, ArchivistError, AuthenticatedAccount, HealthStatus, LoginPrompts, PlatformClient,
    PlatformConnector, PlatformError, PluginAdapter,
};

use crate::mock_platform::MockPlatform;

/// How the next `authenticate` call behaves.
#[derive(Debug, Clone)]
pub struct LoginScript {
    /// The account the handshake ends up authenticated as.
    pub account: UserProfile,
    pub session: String,
    /// The code the platform accepts.
    pub expected_code: String,
    /// `Some(hint)` when two-step verification is enabled.
    pub two_factor: Option<Option<String>>,
    pub expected_password: Option<String>,
}

/// Values the handshake pulled from the prompts, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginTranscript {
    pub phone: Option<String>,
    pub code: Option<String>,
    pub password: Option<String>,
}

#[derive(Default)]
pub struct MockConnector {
    sessions: Mutex<HashMap<String, Arc<MockPlatform>>>,
    script: Mutex<Option<LoginScript>>,
    transcript: Mutex<LoginTranscript>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `token` connect to `platform`.
    pub fn register(&self, token: &str, platform: Arc<MockPlatform>) {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(token.to_string(), platform);
    }

    pub fn revoke(&self, token: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(token);
    }

    pub fn script_login(&self, script: LoginScript) {
        *self.script.lock().unwrap_or_else(|p| p.into_inner()) = Some(script);
    }

    pub fn transcript(&self) -> LoginTranscript {
        self.transcript
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn record(&self, update: impl FnOnce(&mut LoginTranscript)) {
        update(&mut self.transcript.lock().unwrap_or_else(|p| p.into_inner()));
    }
}

#[async_trait]
impl PluginAdapter for MockConnector {
    fn name(&self) -> &str {
        "mock-connector"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, ArchivistError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl PlatformConnector for MockConnector {
    async fn connect(
        &self,
        session: &SecretString,
    ) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let platform = self
            .sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(session.expose_secret())
            .cloned();
        match platform {
            Some(p) => Ok(p),
            None => Err(PlatformError::Revoked {
                reason: "AUTH_KEY_UNREGISTERED".into(),
            }),
        }
    }

    async fn authenticate(
        &self,
        prompts: &dyn LoginPrompts,
    ) -> Result<AuthenticatedAccount, ArchivistError> {
        let script = self
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| ArchivistError::Handshake("no login scripted".into()))?;

        let phone = prompts.phone().await?;
        self.record(|t| t.phone = Some(phone));

        let code = prompts.code().await?;
        self.record(|t| t.code = Some(code.clone()));
        if code != script.expected_code {
            return Err(ArchivistError::Handshake("PHONE_CODE_INVALID".into()));
        }

        if let Some(hint) = script.two_factor {
            let password = prompts.password(hint).await?;
            self.record(|t| t.password = Some(password.clone()));
            if script.expected_password.as_deref() != Some(password.as_str()) {
                return Err(ArchivistError::Handshake("PASSWORD_HASH_INVALID".into()));
            }
        }

        Ok(AuthenticatedAccount {
            profile: script.account,
            session: SecretString::from(script.session),
        })
    }
}
