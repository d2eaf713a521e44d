// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backoff for platform flood-wait signals.

use std::future::Future;
use std::time::Duration;

use archivist_core::{ArchivistError, PlatformError};
use tracing::{error, warn};

use crate::breaker::CircuitBreaker;

/// How flood-wait signals are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottlePolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Multiplier applied to the requested wait.
    pub margin: f64,
}

impl ThrottlePolicy {
    pub fn backoff_for(&self, seconds: u64) -> Duration {
        Duration::from_secs_f64(seconds as f64 * self.margin)
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            margin: 1.1,
        }
    }
}

/// Runs `op` until it stops reporting flood waits.
///
/// A flood wait sleeps for the requested duration times the policy margin and
/// retries, up to `max_attempts` total; a flood wait on the last attempt
/// becomes [`ArchivistError::ThrottleExhausted`]. A too-many-requests signal is
/// never retried: it trips `breaker` and returns [`ArchivistError::PlatformBlocked`].
/// Every other error is returned unchanged.
pub async fn with_throttle_retry<T, E, F, Fut>(
    policy: ThrottlePolicy,
    breaker: &CircuitBreaker,
    mut op: F,
) -> Result<T, ArchivistError>
where
    E: Into<ArchivistError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e.into(),
        };
        match err.platform() {
            Some(PlatformError::FloodWait { seconds }) => {
                if attempt >= max_attempts {
                    error!(attempt, seconds, "flood wait persisted through every retry");
                    return Err(ArchivistError::ThrottleExhausted { attempts: attempt });
                }
                let wait = policy.backoff_for(*seconds);
                warn!(attempt, wait_ms = wait.as_millis() as u64, "flood wait, backing off");
                archivist_prometheus::record_throttle_retry();
                tokio::time::sleep(wait).await;
            }
            Some(PlatformError::TooManyRequests) => {
                breaker.trip();
                return Err(ArchivistError::PlatformBlocked);
            }
            _ => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn flood(seconds: u64) -> PlatformError {
        PlatformError::FloodWait { seconds }
    }

    #[tokio::test(start_paused = true)]
    async fn flood_wait_is_retried_after_margin() {
        let breaker = CircuitBreaker::new();
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = with_throttle_retry(ThrottlePolicy::default(), &breaker, || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(flood(5))
                } else {
                    Ok::<_, PlatformError>("sent")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "sent");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(5500));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_flood_wait_exhausts_after_three_attempts() {
        let breaker = CircuitBreaker::new();
        let calls = Arc::new(AtomicU32::new(0));

        let result = with_throttle_retry(ThrottlePolicy::default(), &breaker, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(flood(5))
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(ArchivistError::ThrottleExhausted { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!breaker.is_tripped());
    }

    #[tokio::test]
    async fn too_many_requests_trips_breaker_without_retry() {
        let breaker = CircuitBreaker::new();
        let calls = Arc::new(AtomicU32::new(0));

        let result = with_throttle_retry(ThrottlePolicy::default(), &breaker, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PlatformError::TooManyRequests)
            }
        })
        .await;

        assert!(matches!(result, Err(ArchivistError::PlatformBlocked)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(breaker.is_tripped());
    }

    #[tokio::test]
    async fn other_errors_pass_through() {
        let breaker = CircuitBreaker::new();
        let result = with_throttle_retry(ThrottlePolicy::default(), &breaker, || async {
            Err::<(), _>(PlatformError::ForwardRefused)
        })
        .await;
        assert!(matches!(
            result,
            Err(ArchivistError::Platform(PlatformError::ForwardRefused))
        ));
    }

    #[test]
    fn backoff_applies_margin() {
        let policy = ThrottlePolicy::default();
        let wait = policy.backoff_for(10);
        assert!(wait >= Duration::from_millis(10_999) && wait <= Duration::from_millis(11_001));
        assert_eq!(policy.backoff_for(0), Duration::ZERO);
    }
}
