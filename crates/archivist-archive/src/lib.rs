// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive pipeline for the Archivist service.
//!
//! - [`ArchivePipeline`]: the [`MessageHandler`](archivist_core::MessageHandler)
//!   every owner session feeds
//! - [`Provisioner`]: destination channels and dialog folders
//! - [`MonitoringFanout`]: mirrored delivery to consenting parents
//! - [`TrackingRegistry`]: the allow-list of contacts that get archive entries

pub mod batch;
pub mod fanout;
pub mod format;
pub mod media;
pub mod pipeline;
pub mod provisioner;
pub mod reply_map;
pub mod tracking;

pub use batch::{BatchKey, MediaGroupBatcher};
pub use fanout::{ArchivedMessage, MonitoringFanout};
pub use media::{MediaStore, ScratchFile};
pub use pipeline::ArchivePipeline;
pub use provisioner::{FolderPurpose, MONITORING_FALLBACK_FOLDER, Provisioner};
pub use reply_map::ReplyMap;
pub use tracking::{TrackedContact, TrackingRegistry};

use archivist_core::ArchivistError;

/// Errors that end the current archive attempt instead of degrading it.
pub(crate) fn must_propagate(e: &ArchivistError) -> bool {
    e.is_escalating()
        || matches!(
            e,
            ArchivistError::ThrottleExhausted { .. } | ArchivistError::Cancelled
        )
}
