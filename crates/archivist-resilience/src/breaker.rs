// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide circuit breaker for platform-level blocking.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

/// Pauses all outbound platform traffic once tripped.
///
/// There is no automatic reset: an operator resumes traffic explicitly.
/// Cloning yields another handle to the same breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    tripped: Arc<watch::Sender<bool>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            tripped: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Opens the breaker. Returns true if this call changed the state.
    pub fn trip(&self) -> bool {
        let was = self.tripped.send_replace(true);
        if !was {
            error!("platform is blocking outbound traffic; all dispatchers paused until resumed");
            archivist_prometheus::record_circuit_trip();
        }
        !was
    }

    /// Closes the breaker and releases every waiting dispatcher.
    pub fn resume(&self) -> bool {
        let was = self.tripped.send_replace(false);
        if was {
            info!("outbound traffic resumed");
        }
        was
    }

    pub fn is_tripped(&self) -> bool {
        *self.tripped.borrow()
    }

    /// Returns immediately while closed, otherwise waits for [`resume`](Self::resume).
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.tripped.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|tripped| !*tripped).await;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trip_and_resume_report_transitions() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_tripped());
        assert!(breaker.trip());
        assert!(!breaker.trip(), "second trip is not a transition");
        assert!(breaker.is_tripped());
        assert!(breaker.resume());
        assert!(!breaker.resume());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_released_on_resume() {
        let breaker = CircuitBreaker::new();
        breaker.trip();

        let waiter = tokio::spawn({
            let breaker = breaker.clone();
            async move { breaker.wait_until_resumed().await }
        });

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(
            !waiter.is_finished(),
            "tripped breaker must never auto-resume"
        );

        breaker.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be released")
            .unwrap();
    }
}
