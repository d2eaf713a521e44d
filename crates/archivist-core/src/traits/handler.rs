// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-event handler installed on every live session.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ArchivistError;
use crate::traits::platform::PlatformClient;
use crate::types::{InboundMessage, UserId};

/// Receives every inbound message of an owner's session.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn on_event(
        &self,
        owner: UserId,
        client: Arc<dyn PlatformClient>,
        message: InboundMessage,
    ) -> Result<(), ArchivistError>;
}
