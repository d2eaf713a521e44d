// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram control-bot adapter for Archivist.
//!
//! Implements [`ControlSurface`] through the Bot API via teloxide: owners and
//! parents receive login prompts, session notices, and monitoring alerts in
//! their private chat with the bot.

pub mod chunk;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, warn};

use archivist_config::model::ControlConfig;
use archivist_core::{
    AdapterType, ArchivistError, ControlSurface, HealthStatus, PluginAdapter, UserId,
};

use crate::chunk::{MAX_MESSAGE_CHARS, split_message};

/// Control surface backed by a Telegram bot account.
///
/// A user's private chat with the bot shares the user's id, so notices are
/// addressed by [`UserId`] directly.
pub struct TelegramControl {
    bot: Bot,
}

impl TelegramControl {
    /// Requires `control.bot_token` to be set and non-empty.
    pub fn new(config: &ControlConfig) -> Result<Self, ArchivistError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            ArchivistError::Config("control.bot_token is required to run the control bot".into())
        })?;
        if token.trim().is_empty() {
            return Err(ArchivistError::Config("control.bot_token cannot be empty".into()));
        }
        Ok(Self {
            bot: Bot::new(token),
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

#[async_trait]
impl PluginAdapter for TelegramControl {
    fn name(&self) -> &str {
        "telegram"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Control
    }

    async fn health_check(&self) -> Result<HealthStatus, ArchivistError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ArchivistError> {
        debug!("Telegram control bot shutting down");
        Ok(())
    }
}

#[async_trait]
impl ControlSurface for TelegramControl {
    async fn notify(&self, user: UserId, text: &str) {
        for part in split_message(text, MAX_MESSAGE_CHARS) {
            if let Err(e) = self.bot.send_message(ChatId(user.0), part).await {
                warn!(user_id = %user, error = %e, "control notification not delivered");
                return;
            }
        }
        debug!(user_id = %user, "control notification sent");
    }

    async fn display_name(&self, user: UserId) -> Option<String> {
        match self.bot.get_chat(ChatId(user.0)).await {
            Ok(chat) => chat
                .first_name()
                .or_else(|| chat.title())
                .map(str::to_owned),
            Err(e) => {
                debug!(user_id = %user, error = %e, "display name lookup failed");
                None
            }
        }
    }
}
