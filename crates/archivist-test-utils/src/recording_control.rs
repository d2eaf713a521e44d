// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control surface that records every notification.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use archivist_core::{
    AdapterType, ArchivistError, ControlSurface, HealthStatus, PluginAdapter, UserId,
};

#[derive(Default)]
pub struct RecordingControl {
    sent: Mutex<Vec<(UserId, String)>>,
    names: Mutex<HashMap<UserId, String>>,
}

impl RecordingControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_display_name(&self, user: UserId, name: &str) {
        self.names
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(user, name.to_string());
    }

    pub fn notifications(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn notifications_for(&self, user: UserId) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for RecordingControl {
    fn name(&self) -> &str {
        "recording-control"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Control
    }

    async fn health_check(&self) -> Result<HealthStatus, ArchivistError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ControlSurface for RecordingControl {
    async fn notify(&self, user: UserId, text: &str) {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((user, text.to_string()));
    }

    async fn display_name(&self, user: UserId) -> Option<String> {
        self.names
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&user)
            .cloned()
    }
}
