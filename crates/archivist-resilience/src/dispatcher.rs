// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-owner outbound call queues.
//!
//! Every owner gets an independent lane: one operation at a time, FIFO, and
//! at most `capacity` operations per fixed window. Lanes share only the
//! process-wide [`CircuitBreaker`].

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use archivist_config::model::LimitsConfig;
use archivist_core::{ArchivistError, UserId};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::breaker::CircuitBreaker;
use crate::throttle::{ThrottlePolicy, with_throttle_retry};

/// Fixed-window admission limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub window: Duration,
    pub capacity: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            capacity: 25,
        }
    }
}

/// Snapshot of one owner's lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaneStats {
    /// Submitted operations that have not finished, including the running one.
    pub pending: usize,
    /// Operations admitted in the current window.
    pub used_in_window: u32,
    pub paused: bool,
}

struct Window {
    started: Instant,
    used: u32,
}

struct Lane {
    turn: tokio::sync::Mutex<()>,
    window: Mutex<Window>,
    pending: AtomicUsize,
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl Lane {
    fn new() -> Self {
        Self {
            turn: tokio::sync::Mutex::new(()),
            window: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
            pending: AtomicUsize::new(0),
            paused: watch::Sender::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Admits one operation, or returns how long until the window resets.
    fn try_admit(&self, limit: RateLimit) -> Result<(), Duration> {
        let mut window = self.window.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        if now.duration_since(window.started) >= limit.window {
            window.started = now;
            window.used = 0;
        }
        if window.used < limit.capacity {
            window.used += 1;
            Ok(())
        } else {
            Err((window.started + limit.window).saturating_duration_since(now))
        }
    }

    fn used_in_window(&self, limit: RateLimit) -> u32 {
        let window = self.window.lock().unwrap_or_else(|p| p.into_inner());
        if window.started.elapsed() >= limit.window {
            0
        } else {
            window.used
        }
    }

    async fn wait_unpaused(&self) {
        let mut rx = self.paused.subscribe();
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Rate-limited dispatcher shared by every owner session.
pub struct Dispatcher {
    lanes: DashMap<UserId, Arc<Lane>>,
    limit: RateLimit,
    throttle: ThrottlePolicy,
    breaker: CircuitBreaker,
}

impl Dispatcher {
    pub fn new(limit: RateLimit, throttle: ThrottlePolicy, breaker: CircuitBreaker) -> Self {
        Self {
            lanes: DashMap::new(),
            limit,
            throttle,
            breaker,
        }
    }

    pub fn from_config(config: &LimitsConfig, breaker: CircuitBreaker) -> Self {
        Self::new(
            RateLimit {
                window: Duration::from_secs(config.window_secs),
                capacity: config.capacity,
            },
            ThrottlePolicy {
                max_attempts: config.throttle_attempts,
                margin: config.throttle_margin,
            },
            breaker,
        )
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn throttle(&self) -> ThrottlePolicy {
        self.throttle
    }

    /// The owner's lane, created on first use. A lane lives until
    /// [`clear`](Self::clear), which session teardown calls.
    fn lane(&self, owner: UserId) -> Arc<Lane> {
        self.lanes
            .entry(owner)
            .or_insert_with(|| Arc::new(Lane::new()))
            .clone()
    }

    /// Queues `op` on the owner's lane and awaits its result.
    ///
    /// The operation starts only once it reaches the head of the queue, the
    /// lane is not paused, the breaker is closed, and the window has room.
    /// Work still waiting when the lane is cleared resolves to
    /// [`ArchivistError::Cancelled`]; a started operation always runs to completion.
    pub async fn submit<T, E, Fut>(&self, owner: UserId, op: Fut) -> Result<T, ArchivistError>
    where
        E: Into<ArchivistError>,
        Fut: Future<Output = Result<T, E>>,
    {
        let lane = self.lane(owner);
        lane.pending.fetch_add(1, Ordering::SeqCst);
        let _pending = PendingGuard(&lane.pending);

        let _turn = tokio::select! {
            _ = lane.cancel.cancelled() => return Err(ArchivistError::Cancelled),
            turn = lane.turn.lock() => turn,
        };

        loop {
            tokio::select! {
                _ = lane.cancel.cancelled() => return Err(ArchivistError::Cancelled),
                _ = async {
                    lane.wait_unpaused().await;
                    self.breaker.wait_until_resumed().await;
                } => {}
            }
            if lane.cancel.is_cancelled() {
                return Err(ArchivistError::Cancelled);
            }
            if *lane.paused.borrow() || self.breaker.is_tripped() {
                continue;
            }
            match lane.try_admit(self.limit) {
                Ok(()) => break,
                Err(wait) => {
                    debug!(owner = %owner, wait_ms = wait.as_millis() as u64, "rate window full");
                    tokio::select! {
                        _ = lane.cancel.cancelled() => return Err(ArchivistError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }

        op.await.map_err(Into::into)
    }

    /// Submits an operation built by `make`, retrying flood waits through the
    /// backoff helper. Each retry re-enters the queue at the back.
    pub async fn call<T, E, F, Fut>(&self, owner: UserId, mut make: F) -> Result<T, ArchivistError>
    where
        E: Into<ArchivistError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        with_throttle_retry(self.throttle, &self.breaker, || self.submit(owner, make())).await
    }

    pub fn stats(&self, owner: UserId) -> LaneStats {
        match self.lanes.get(&owner) {
            Some(lane) => LaneStats {
                pending: lane.pending.load(Ordering::SeqCst),
                used_in_window: lane.used_in_window(self.limit),
                paused: *lane.paused.borrow(),
            },
            None => LaneStats::default(),
        }
    }

    /// Holds queued work for one owner until [`resume`](Self::resume).
    pub fn pause(&self, owner: UserId) {
        self.lane(owner).paused.send_replace(true);
        info!(owner = %owner, "dispatcher lane paused");
    }

    pub fn resume(&self, owner: UserId) {
        if let Some(lane) = self.lanes.get(&owner) {
            lane.paused.send_replace(false);
            info!(owner = %owner, "dispatcher lane resumed");
        }
    }

    /// Drops the owner's lane, cancelling everything still waiting in it.
    pub fn clear(&self, owner: UserId) {
        if let Some((_, lane)) = self.lanes.remove(&owner) {
            lane.cancel.cancel();
            debug!(owner = %owner, "dispatcher lane cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::PlatformError;
    use std::sync::atomic::AtomicU32;

    fn dispatcher(capacity: u32) -> Dispatcher {
        Dispatcher::new(
            RateLimit {
                window: Duration::from_secs(60),
                capacity,
            },
            ThrottlePolicy::default(),
            CircuitBreaker::new(),
        )
    }

    async fn ok<T>(value: T) -> Result<T, ArchivistError> {
        Ok(value)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn lane_runs_operations_in_submission_order() {
        let d = Arc::new(dispatcher(25));
        let order = Arc::new(Mutex::new(Vec::new()));
        let owner = UserId(1);

        let mut handles = Vec::new();
        for i in 0..4 {
            let d = d.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                d.submit(owner, async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    order.lock().unwrap().push(i);
                    Ok::<_, ArchivistError>(())
                })
                .await
            }));
            settle().await;
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_window_delays_until_reset() {
        let d = dispatcher(2);
        let owner = UserId(1);
        let start = Instant::now();

        d.submit(owner, ok(1)).await.unwrap();
        d.submit(owner, ok(2)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(d.stats(owner).used_in_window, 2);

        d.submit(owner, ok(3)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(d.stats(owner).used_in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn owners_do_not_block_each_other() {
        let d = Arc::new(dispatcher(1));
        d.submit(UserId(1), ok(())).await.unwrap();

        let blocked = tokio::spawn({
            let d = d.clone();
            async move { d.submit(UserId(1), ok(())).await }
        });
        settle().await;
        assert!(!blocked.is_finished());

        let start = Instant::now();
        d.submit(UserId(2), ok(())).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        blocked.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn tripped_breaker_holds_every_lane() {
        let d = Arc::new(dispatcher(25));
        d.breaker().trip();

        let held = tokio::spawn({
            let d = d.clone();
            async move { d.submit(UserId(9), ok("done")).await }
        });
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!held.is_finished());

        d.breaker().resume();
        assert_eq!(held.await.unwrap().unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn paused_lane_waits_for_resume() {
        let d = Arc::new(dispatcher(25));
        let owner = UserId(4);
        d.pause(owner);
        assert!(d.stats(owner).paused);

        let held = tokio::spawn({
            let d = d.clone();
            async move { d.submit(owner, ok(())).await }
        });
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!held.is_finished());
        assert_eq!(d.stats(owner).pending, 1);

        d.resume(owner);
        held.await.unwrap().unwrap();
        assert_eq!(d.stats(owner).pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_waiting_work() {
        let d = Arc::new(dispatcher(25));
        let owner = UserId(3);

        let running = tokio::spawn({
            let d = d.clone();
            async move {
                d.submit(owner, async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, ArchivistError>("finished")
                })
                .await
            }
        });
        settle().await;
        let waiting = tokio::spawn({
            let d = d.clone();
            async move { d.submit(owner, ok("never")).await }
        });
        settle().await;

        d.clear(owner);
        assert!(matches!(waiting.await.unwrap(), Err(ArchivistError::Cancelled)));
        assert_eq!(running.await.unwrap().unwrap(), "finished");
    }

    #[tokio::test(start_paused = true)]
    async fn lanes_live_until_cleared() {
        let d = dispatcher(25);
        d.submit(UserId(1), ok(())).await.unwrap();
        d.submit(UserId(2), ok(())).await.unwrap();
        assert_eq!(d.lanes.len(), 2);

        d.clear(UserId(1));
        assert_eq!(d.lanes.len(), 1);
        assert_eq!(d.stats(UserId(1)), LaneStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn call_retries_flood_wait_through_the_queue() {
        let d = dispatcher(25);
        let owner = UserId(5);
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = d
            .call(owner, || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(PlatformError::FloodWait { seconds: 5 })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert!(start.elapsed() >= Duration::from_millis(5500));
        assert_eq!(d.stats(owner).used_in_window, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn too_many_requests_pauses_all_owners() {
        let d = Arc::new(dispatcher(25));
        let result = d
            .call(UserId(1), || async {
                Err::<(), _>(PlatformError::TooManyRequests)
            })
            .await;
        assert!(matches!(result, Err(ArchivistError::PlatformBlocked)));
        assert!(d.breaker().is_tripped());

        let other = tokio::spawn({
            let d = d.clone();
            async move { d.submit(UserId(2), ok(())).await }
        });
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(!other.is_finished());
        d.breaker().resume();
        other.await.unwrap().unwrap();
    }
}
