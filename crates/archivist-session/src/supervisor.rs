// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owner session supervisor.
//!
//! Sole writer of the owner → live connection map and of connectivity
//! state. Every connection is wrapped in a [`GuardedClient`]; revocation
//! reports from the guard are handled by a reaper task that tears the
//! session down exactly once.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use archivist_core::types::OwnerStatus;
use archivist_core::{
    ArchiveStore, ArchivistError, ConnectivityState, ControlSurface, KeyedLocks, MessageHandler,
    PlatformClient, PlatformConnector, SessionRegistry, UserId,
};
use archivist_resilience::Dispatcher;

use crate::credentials::CredentialStore;
use crate::guard::{GuardedClient, SessionEnd};
use crate::notices;

/// Teardown reason for an explicit stop request.
pub const USER_REQUESTED: &str = "USER_REQUESTED";
/// Teardown reason after the owner logged out through their own session.
pub const LOGGED_OUT: &str = "LOGGED_OUT";

const STREAM_RETRY_DELAY: Duration = Duration::from_secs(5);
const START_ALL_CONCURRENCY: usize = 8;

/// Outcome of [`Supervisor::start_all`].
#[derive(Debug, Default)]
pub struct StartReport {
    pub started: Vec<UserId>,
    pub failed: Vec<(UserId, String)>,
}

pub struct Supervisor {
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn PlatformConnector>,
    credentials: Arc<CredentialStore>,
    store: Arc<dyn ArchiveStore>,
    control: Arc<dyn ControlSurface>,
    handler: Arc<dyn MessageHandler>,
    dispatcher: Arc<Dispatcher>,
    locks: KeyedLocks<UserId>,
    states: DashMap<UserId, ConnectivityState>,
    loops: DashMap<UserId, CancellationToken>,
    ended: mpsc::UnboundedSender<SessionEnd>,
    closing: CancellationToken,
}

impl Supervisor {
    /// Builds the supervisor and spawns its reaper task.
    pub fn new(
        registry: Arc<SessionRegistry>,
        connector: Arc<dyn PlatformConnector>,
        credentials: Arc<CredentialStore>,
        store: Arc<dyn ArchiveStore>,
        control: Arc<dyn ControlSurface>,
        handler: Arc<dyn MessageHandler>,
        dispatcher: Arc<Dispatcher>,
    ) -> Arc<Self> {
        let (ended, rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(Self {
            registry,
            connector,
            credentials,
            store,
            control,
            handler,
            dispatcher,
            locks: KeyedLocks::new(),
            states: DashMap::new(),
            loops: DashMap::new(),
            ended,
            closing: CancellationToken::new(),
        });
        let closing = supervisor.closing.clone();
        tokio::spawn(reap(Arc::downgrade(&supervisor), rx, closing));
        supervisor
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// The live connection for `owner`, if any.
    pub fn get(&self, owner: UserId) -> Option<Arc<dyn PlatformClient>> {
        self.registry.get(owner)
    }

    pub fn state(&self, owner: UserId) -> Option<ConnectivityState> {
        self.states.get(&owner).map(|s| *s)
    }

    /// Opens and installs a live session. Idempotent: an existing connection
    /// is returned unchanged.
    pub async fn start(
        self: &Arc<Self>,
        owner: UserId,
        session: &SecretString,
    ) -> Result<Arc<dyn PlatformClient>, ArchivistError> {
        let _guard = self.locks.lock(owner).await;
        if let Some(existing) = self.registry.get(owner) {
            debug!(owner = %owner, "session already live");
            return Ok(existing);
        }

        self.states.insert(owner, ConnectivityState::Connecting);
        let raw = match self.connector.connect(session).await {
            Ok(raw) => raw,
            Err(e) => {
                self.states.insert(owner, ConnectivityState::Disconnected);
                if let Some(reason) = e.revocation_reason() {
                    let _ = self.ended.send(SessionEnd {
                        owner,
                        reason: reason.to_string(),
                    });
                }
                return Err(e.into());
            }
        };

        let client: Arc<dyn PlatformClient> =
            Arc::new(GuardedClient::new(owner, raw.clone(), self.ended.clone()));
        let me = match client.get_me().await {
            Ok(me) => me,
            Err(e) => {
                let _ = raw.disconnect().await;
                self.states.insert(owner, ConnectivityState::Disconnected);
                return Err(e.into());
            }
        };
        if me.id != owner {
            let _ = raw.disconnect().await;
            self.states.insert(owner, ConnectivityState::Disconnected);
            return Err(ArchivistError::Handshake(format!(
                "stored credential for {owner} authenticates as {}",
                me.id
            )));
        }

        let client = self.registry.insert_if_absent(owner, client);
        self.states.insert(owner, ConnectivityState::Connected);
        self.spawn_update_loop(owner, client.clone());
        archivist_prometheus::set_live_sessions(self.registry.len());
        self.credentials.touch(owner).await;
        info!(owner = %owner, "session started");
        Ok(client)
    }

    /// Re-establishes every persisted session. Individual failures are
    /// logged and reported, never fatal.
    pub async fn start_all(self: &Arc<Self>) -> StartReport {
        let credentials = self.credentials.all();
        info!(count = credentials.len(), "starting persisted sessions");

        let results: Vec<(UserId, Result<(), ArchivistError>)> =
            futures::stream::iter(credentials)
                .map(|(owner, token)| {
                    let this = Arc::clone(self);
                    async move { (owner, this.start(owner, &token).await.map(|_| ())) }
                })
                .buffer_unordered(START_ALL_CONCURRENCY)
                .collect()
                .await;

        let mut report = StartReport::default();
        for (owner, result) in results {
            match result {
                Ok(()) => report.started.push(owner),
                Err(e) => {
                    error!(owner = %owner, error = %e, "failed to start session");
                    report.failed.push((owner, e.to_string()));
                }
            }
        }
        report.started.sort();
        report.failed.sort_by_key(|(owner, _)| *owner);
        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "persisted sessions processed"
        );
        report
    }

    /// Explicit disconnect request. Repeated calls are no-ops.
    pub async fn stop(&self, owner: UserId) -> bool {
        self.teardown(owner, USER_REQUESTED).await
    }

    /// Disconnects, erases the credential, disables the owner, and notifies
    /// them once. Returns false when there was nothing to tear down.
    pub async fn teardown(&self, owner: UserId, reason: &str) -> bool {
        let _guard = self.locks.lock(owner).await;
        let client = self.registry.remove(owner);
        if client.is_none() && !self.credentials.contains(owner) {
            debug!(owner = %owner, reason, "nothing to tear down");
            return false;
        }
        warn!(owner = %owner, reason, "tearing down session");

        if let Some((_, token)) = self.loops.remove(&owner) {
            token.cancel();
        }
        if let Some(client) = client
            && let Err(e) = client.disconnect().await
        {
            warn!(owner = %owner, error = %e, "disconnect failed during teardown");
        }
        self.dispatcher.clear(owner);

        if let Err(e) = self.credentials.delete(owner).await {
            error!(owner = %owner, error = %e, "failed to erase credential");
        }
        if let Err(e) = self
            .store
            .set_owner_status(owner, OwnerStatus::Disabled)
            .await
        {
            error!(owner = %owner, error = %e, "failed to disable owner");
        }
        if let Err(e) = self.store.set_credential_present(owner, false).await {
            error!(owner = %owner, error = %e, "failed to clear credential flag");
        }

        let state = match reason {
            USER_REQUESTED | LOGGED_OUT => ConnectivityState::Disconnected,
            _ => ConnectivityState::Revoked,
        };
        self.states.insert(owner, state);
        archivist_prometheus::record_session_end(reason);
        archivist_prometheus::set_live_sessions(self.registry.len());

        self.control
            .notify(owner, &notices::session_ended(reason))
            .await;
        true
    }

    /// Disconnects every live session without erasing credentials.
    pub async fn shutdown(&self) {
        self.closing.cancel();
        for owner in self.registry.owners() {
            let _guard = self.locks.lock(owner).await;
            if let Some((_, token)) = self.loops.remove(&owner) {
                token.cancel();
            }
            if let Some(client) = self.registry.remove(owner)
                && let Err(e) = client.disconnect().await
            {
                warn!(owner = %owner, error = %e, "disconnect failed during shutdown");
            }
            self.states.insert(owner, ConnectivityState::Disconnected);
        }
        archivist_prometheus::set_live_sessions(0);
        info!("all sessions disconnected");
    }

    fn spawn_update_loop(self: &Arc<Self>, owner: UserId, client: Arc<dyn PlatformClient>) {
        let token = CancellationToken::new();
        if let Some(old) = self.loops.insert(owner, token.clone()) {
            old.cancel();
        }
        let supervisor = Arc::downgrade(self);
        let handler = self.handler.clone();

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    next = client.next_message() => next,
                };
                match next {
                    Ok(Some(message)) => {
                        let handler = handler.clone();
                        let client = client.clone();
                        tokio::spawn(async move {
                            let id = message.id;
                            if let Err(e) = handler.on_event(owner, client, message).await {
                                warn!(
                                    owner = %owner,
                                    message_id = id,
                                    error = %e,
                                    "event handling failed"
                                );
                            }
                        });
                    }
                    Ok(None) => {
                        if !token.is_cancelled()
                            && let Some(supervisor) = supervisor.upgrade()
                        {
                            supervisor.on_stream_closed(owner, &client);
                        }
                        break;
                    }
                    Err(e) if e.is_revocation() => break,
                    Err(e) => {
                        warn!(owner = %owner, error = %e, "update stream error, retrying");
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(STREAM_RETRY_DELAY) => {}
                        }
                    }
                }
            }
            debug!(owner = %owner, "update loop finished");
        });
    }

    /// Transport loss: the session goes away but its credential stays.
    fn on_stream_closed(&self, owner: UserId, client: &Arc<dyn PlatformClient>) {
        if self.registry.remove_if_same(owner, client) {
            self.loops.remove(&owner);
            self.states.insert(owner, ConnectivityState::Disconnected);
            archivist_prometheus::set_live_sessions(self.registry.len());
            warn!(owner = %owner, "update stream closed; session disconnected");
        }
    }
}

async fn reap(
    supervisor: Weak<Supervisor>,
    mut ended: mpsc::UnboundedReceiver<SessionEnd>,
    closing: CancellationToken,
) {
    loop {
        let end = tokio::select! {
            _ = closing.cancelled() => break,
            end = ended.recv() => end,
        };
        let Some(end) = end else { break };
        let Some(supervisor) = supervisor.upgrade() else {
            break;
        };
        supervisor.teardown(end.owner, &end.reason).await;
    }
}
