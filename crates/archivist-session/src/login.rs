// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Login coordinator.
//!
//! The platform's login handshake pulls phone, code, and password from
//! [`LoginPrompts`] in sequence. A [`LoginAttempt`] answers each prompt by
//! parking a oneshot continuation that the matching `supply_*` call later
//! completes, possibly minutes afterwards. At most one attempt exists per
//! owner, and each prompt kind has at most one pending continuation.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use strum::Display;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use archivist_core::{
    ArchiveStore, ArchivistError, AuthenticatedAccount, ControlSurface, LoginPrompts,
    PlatformConnector, UserId,
};

use crate::credentials::CredentialStore;
use crate::notices;
use crate::supervisor::Supervisor;

/// Maximum digits in a login code.
pub const CODE_LEN: usize = 6;

/// Where a login attempt currently waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LoginStage {
    Starting,
    AwaitingPhone,
    AwaitingCode,
    AwaitingPassword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
enum Prompt {
    Phone,
    Code,
    Password,
}

impl Prompt {
    fn stage(self) -> LoginStage {
        match self {
            Self::Phone => LoginStage::AwaitingPhone,
            Self::Code => LoginStage::AwaitingCode,
            Self::Password => LoginStage::AwaitingPassword,
        }
    }
}

#[derive(Default)]
struct Pending {
    phone: Option<oneshot::Sender<String>>,
    code: Option<oneshot::Sender<String>>,
    password: Option<oneshot::Sender<String>>,
}

impl Pending {
    fn slot(&mut self, prompt: Prompt) -> &mut Option<oneshot::Sender<String>> {
        match prompt {
            Prompt::Phone => &mut self.phone,
            Prompt::Code => &mut self.code,
            Prompt::Password => &mut self.password,
        }
    }
}

/// Display-only accumulator for the numeric login code.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodeBuffer(String);

impl CodeBuffer {
    /// Appends a digit; anything beyond [`CODE_LEN`] digits is dropped.
    pub fn push(&mut self, digit: char) {
        if digit.is_ascii_digit() && self.0.len() < CODE_LEN {
            self.0.push(digit);
        }
    }

    pub fn backspace(&mut self) {
        self.0.pop();
    }

    /// Takes the accumulated code, leaving the buffer empty. `None` if empty.
    pub fn take(&mut self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.0))
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entered digits padded with `_` to the full code length.
    pub fn display(&self) -> String {
        format!("{}{}", self.0, "_".repeat(CODE_LEN - self.0.len()))
    }
}

/// One in-progress handshake.
pub struct LoginAttempt {
    owner: UserId,
    preset_phone: Mutex<Option<String>>,
    pending: Mutex<Pending>,
    code: Mutex<CodeBuffer>,
    stage: Mutex<LoginStage>,
    cancel: CancellationToken,
    control: Arc<dyn ControlSurface>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl LoginAttempt {
    fn new(owner: UserId, phone: Option<String>, control: Arc<dyn ControlSurface>) -> Self {
        Self {
            owner,
            preset_phone: Mutex::new(phone),
            pending: Mutex::new(Pending::default()),
            code: Mutex::new(CodeBuffer::default()),
            stage: Mutex::new(LoginStage::Starting),
            cancel: CancellationToken::new(),
            control,
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn stage(&self) -> LoginStage {
        *guard(&self.stage)
    }

    pub fn code_display(&self) -> String {
        guard(&self.code).display()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn take_pending(&self, prompt: Prompt) -> Option<oneshot::Sender<String>> {
        guard(&self.pending).slot(prompt).take()
    }

    /// Completes the pending continuation for `prompt`. False when nothing
    /// was waiting for it.
    fn resolve(&self, prompt: Prompt, value: String) -> bool {
        match self.take_pending(prompt) {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    async fn suspend(&self, prompt: Prompt) -> Result<String, ArchivistError> {
        let (tx, rx) = oneshot::channel();
        *guard(&self.pending).slot(prompt) = Some(tx);
        *guard(&self.stage) = prompt.stage();
        info!(owner = %self.owner, prompt = %prompt, "waiting for login input");

        tokio::select! {
            _ = self.cancel.cancelled() => {
                Err(ArchivistError::Handshake("login cancelled".into()))
            }
            value = rx => value.map_err(|_| {
                ArchivistError::Handshake(format!("{prompt} prompt abandoned"))
            }),
        }
    }
}

#[async_trait]
impl LoginPrompts for LoginAttempt {
    async fn phone(&self) -> Result<String, ArchivistError> {
        let preset = guard(&self.preset_phone).take();
        match preset {
            Some(phone) => {
                debug!(owner = %self.owner, "using phone supplied with the login request");
                Ok(phone)
            }
            None => self.suspend(Prompt::Phone).await,
        }
    }

    async fn code(&self) -> Result<String, ArchivistError> {
        self.suspend(Prompt::Code).await
    }

    async fn password(&self, hint: Option<String>) -> Result<String, ArchivistError> {
        info!(owner = %self.owner, "two-step verification required");
        self.control
            .notify(self.owner, &notices::two_factor_prompt(hint.as_deref()))
            .await;
        self.suspend(Prompt::Password).await
    }
}

pub struct LoginCoordinator {
    attempts: DashMap<UserId, Arc<LoginAttempt>>,
    connector: Arc<dyn PlatformConnector>,
    credentials: Arc<CredentialStore>,
    store: Arc<dyn ArchiveStore>,
    control: Arc<dyn ControlSurface>,
    supervisor: Arc<Supervisor>,
}

impl LoginCoordinator {
    pub fn new(
        connector: Arc<dyn PlatformConnector>,
        credentials: Arc<CredentialStore>,
        store: Arc<dyn ArchiveStore>,
        control: Arc<dyn ControlSurface>,
        supervisor: Arc<Supervisor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            attempts: DashMap::new(),
            connector,
            credentials,
            store,
            control,
            supervisor,
        })
    }

    /// Returns the owner's attempt, starting the handshake if none exists.
    pub fn begin(self: &Arc<Self>, owner: UserId, phone: Option<String>) -> Arc<LoginAttempt> {
        let attempt = match self.attempts.entry(owner) {
            Entry::Occupied(existing) => return existing.get().clone(),
            Entry::Vacant(slot) => {
                let attempt = Arc::new(LoginAttempt::new(owner, phone, self.control.clone()));
                slot.insert(attempt.clone());
                attempt
            }
        };
        info!(owner = %owner, "login started");
        tokio::spawn(Arc::clone(self).run(attempt.clone()));
        attempt
    }

    pub fn attempt(&self, owner: UserId) -> Option<Arc<LoginAttempt>> {
        self.attempts.get(&owner).map(|a| a.clone())
    }

    fn require(&self, owner: UserId) -> Result<Arc<LoginAttempt>, ArchivistError> {
        self.attempt(owner)
            .ok_or_else(|| ArchivistError::NotFound(format!("no login in progress for {owner}")))
    }

    pub async fn supply_phone(&self, owner: UserId, phone: String) -> Result<(), ArchivistError> {
        let attempt = self.require(owner)?;
        if attempt.resolve(Prompt::Phone, phone) {
            return Ok(());
        }
        Err(self.abort(&attempt, "the phone number was not requested").await)
    }

    /// Applies a digit, `backspace`, or `submit` to the code accumulator and
    /// returns the updated display.
    pub async fn append_code_digit(
        &self,
        owner: UserId,
        input: &str,
    ) -> Result<String, ArchivistError> {
        let attempt = self.require(owner)?;
        match input {
            "backspace" => {
                guard(&attempt.code).backspace();
            }
            "submit" => {
                let code = guard(&attempt.code).take();
                if let Some(code) = code
                    && !attempt.resolve(Prompt::Code, code)
                {
                    return Err(self.abort(&attempt, "the code was not requested").await);
                }
            }
            digit => {
                let mut chars = digit.chars();
                match (chars.next(), chars.next()) {
                    (Some(d), None) => {
                        guard(&attempt.code).push(d);
                    }
                    _ => debug!(owner = %owner, "ignoring non-digit code input"),
                }
            }
        }
        Ok(attempt.code_display())
    }

    pub async fn supply_password(
        &self,
        owner: UserId,
        password: String,
    ) -> Result<(), ArchivistError> {
        let attempt = self.require(owner)?;
        if attempt.resolve(Prompt::Password, password) {
            return Ok(());
        }
        Err(self.abort(&attempt, "the password was not requested").await)
    }

    /// Empty when no attempt is in progress.
    pub fn current_code_display(&self, owner: UserId) -> String {
        self.attempt(owner)
            .map(|a| a.code_display())
            .unwrap_or_default()
    }

    /// Cancels and removes the owner's attempt. Silent.
    pub fn cleanup(&self, owner: UserId) -> bool {
        match self.attempts.remove(&owner) {
            Some((_, attempt)) => {
                attempt.cancel.cancel();
                info!(owner = %owner, "login attempt cleaned up");
                true
            }
            None => false,
        }
    }

    fn forget(&self, attempt: &Arc<LoginAttempt>) {
        self.attempts
            .remove_if(&attempt.owner, |_, a| Arc::ptr_eq(a, attempt));
    }

    async fn abort(&self, attempt: &Arc<LoginAttempt>, reason: &str) -> ArchivistError {
        warn!(owner = %attempt.owner, reason, "login aborted");
        attempt.cancel.cancel();
        self.forget(attempt);
        self.control
            .notify(attempt.owner, &notices::login_aborted(reason))
            .await;
        ArchivistError::Handshake(reason.to_string())
    }

    async fn run(self: Arc<Self>, attempt: Arc<LoginAttempt>) {
        let owner = attempt.owner;
        let result = tokio::select! {
            _ = attempt.cancel.cancelled() => Err(ArchivistError::Cancelled),
            result = self.connector.authenticate(attempt.as_ref()) => result,
        };

        match result {
            Ok(account) => self.complete(owner, account).await,
            Err(_) if attempt.is_cancelled() => debug!(owner = %owner, "handshake stopped"),
            Err(e) => {
                warn!(owner = %owner, error = %e, "login failed");
                self.control
                    .notify(owner, &notices::login_failed(&e.to_string()))
                    .await;
            }
        }
        self.forget(&attempt);
        attempt.cancel.cancel();
    }

    async fn complete(&self, owner: UserId, account: AuthenticatedAccount) {
        let actual = account.profile.id;
        if actual != owner {
            // The token is dropped here without ever being persisted.
            warn!(owner = %owner, actual = %actual, "login authenticated a different account");
            self.control
                .notify(owner, &notices::identity_mismatch(owner, actual))
                .await;
            return;
        }

        let phone = account.profile.phone.as_deref();
        if let Err(e) = self.credentials.save(owner, &account.session, phone).await {
            warn!(owner = %owner, error = %e, "failed to store credential");
            self.control
                .notify(owner, &notices::login_failed("could not store the session"))
                .await;
            return;
        }
        if let Err(e) = self.store.record_profile(&account.profile).await {
            warn!(owner = %owner, error = %e, "failed to record owner profile");
        }
        if let Err(e) = self.store.set_credential_present(owner, true).await {
            warn!(owner = %owner, error = %e, "failed to set credential flag");
        }

        info!(owner = %owner, "login succeeded");
        let notice = notices::login_succeeded();
        self.control.notify(owner, &notice).await;

        if let Err(e) = self.supervisor.start(owner, &account.session).await {
            warn!(owner = %owner, error = %e, "session did not start after login");
        }
    }
}
