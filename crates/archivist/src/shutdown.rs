// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling: SIGINT/SIGTERM stop the service, SIGUSR1 resumes
//! outbound traffic after a platform block.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use archivist_resilience::CircuitBreaker;

/// Returns a token cancelled on Ctrl+C or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable; only Ctrl+C stops the service");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        trigger.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Resumes `breaker` on every SIGUSR1 until `cancel` fires.
#[cfg(unix)]
pub fn install_resume_handler(breaker: CircuitBreaker, cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(usr1) => usr1,
        Err(e) => {
            warn!(error = %e, "SIGUSR1 handler unavailable; resume through the gateway instead");
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = usr1.recv() => {
                    if received.is_none() {
                        break;
                    }
                    if breaker.resume() {
                        info!("traffic resumed by SIGUSR1");
                    } else {
                        debug!("SIGUSR1 received but traffic was not paused");
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
pub fn install_resume_handler(_breaker: CircuitBreaker, _cancel: CancellationToken) {
    debug!("SIGUSR1 not supported on this platform; resume through the gateway");
}
