// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound traffic control for owner sessions.
//!
//! - [`Dispatcher`]: per-owner FIFO lanes with a fixed-window limit
//! - [`with_throttle_retry`]: flood-wait backoff with a retry ceiling
//! - [`CircuitBreaker`]: process-wide pause on platform-level blocking

pub mod breaker;
pub mod dispatcher;
pub mod throttle;

pub use breaker::CircuitBreaker;
pub use dispatcher::{Dispatcher, LaneStats, RateLimit};
pub use throttle::{ThrottlePolicy, with_throttle_retry};
