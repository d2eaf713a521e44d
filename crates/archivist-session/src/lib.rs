// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owner session lifecycle: credentials on disk, the interactive login
//! handshake, and the supervisor that keeps one live connection per owner.

pub mod credentials;
pub mod guard;
pub mod login;
pub mod notices;
pub mod supervisor;

pub use credentials::{CredentialInfo, CredentialStore};
pub use guard::{GuardedClient, SessionEnd};
pub use login::{CodeBuffer, LoginAttempt, LoginCoordinator, LoginStage};
pub use supervisor::{LOGGED_OUT, StartReport, Supervisor, USER_REQUESTED};
