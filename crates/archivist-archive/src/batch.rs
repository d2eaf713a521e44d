// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplication of multi-item media groups.
//!
//! Every item of a media group arrives as its own event. The first event to
//! [`claim`](MediaGroupBatcher::claim) a group becomes the leader: it waits
//! out the collection window, then archives all siblings in one go. Every
//! other event for the same group is dropped, including late arrivals for a
//! group that finished recently.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use archivist_core::UserId;

/// How long a finished group keeps absorbing late siblings.
const DONE_RETENTION: Duration = Duration::from_secs(60);

/// Identifies one media group within one owner's conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub owner: UserId,
    pub conversation: i64,
    pub grouped_id: i64,
}

#[derive(Debug, Clone, Copy)]
enum BatchState {
    InFlight,
    Done(Instant),
}

pub struct MediaGroupBatcher {
    window: Duration,
    groups: DashMap<BatchKey, BatchState>,
}

impl MediaGroupBatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            groups: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Claims leadership of `key`. `None` if another event already did.
    pub fn claim(&self, key: BatchKey) -> Option<BatchClaim<'_>> {
        let now = Instant::now();
        self.groups.retain(|_, state| match state {
            BatchState::InFlight => true,
            BatchState::Done(at) => now.duration_since(*at) < DONE_RETENTION,
        });

        let mut claimed = false;
        self.groups.entry(key).or_insert_with(|| {
            claimed = true;
            BatchState::InFlight
        });
        claimed.then(|| BatchClaim { batcher: self, key })
    }

    /// Waits out the collection window.
    pub async fn wait_window(&self) {
        tokio::time::sleep(self.window).await;
    }

    pub fn in_flight(&self) -> usize {
        self.groups
            .iter()
            .filter(|e| matches!(e.value(), BatchState::InFlight))
            .count()
    }
}

/// Leadership of one media group. Dropping it marks the group done.
pub struct BatchClaim<'a> {
    batcher: &'a MediaGroupBatcher,
    key: BatchKey,
}

impl BatchClaim<'_> {
    pub fn key(&self) -> BatchKey {
        self.key
    }
}

impl Drop for BatchClaim<'_> {
    fn drop(&mut self) {
        self.batcher
            .groups
            .insert(self.key, BatchState::Done(Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(grouped_id: i64) -> BatchKey {
        BatchKey {
            owner: UserId(1),
            conversation: 2,
            grouped_id,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_first_claim_leads() {
        let batcher = MediaGroupBatcher::new(Duration::from_secs(1));
        let leader = batcher.claim(key(9)).unwrap();
        assert!(batcher.claim(key(9)).is_none());
        assert!(batcher.claim(key(10)).is_some());
        assert_eq!(leader.key().grouped_id, 9);
        assert_eq!(batcher.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_siblings_are_absorbed_then_forgotten() {
        let batcher = MediaGroupBatcher::new(Duration::from_secs(1));
        drop(batcher.claim(key(9)).unwrap());
        assert_eq!(batcher.in_flight(), 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(batcher.claim(key(9)).is_none());

        tokio::time::advance(DONE_RETENTION).await;
        assert!(batcher.claim(key(9)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_claim_leaves_the_leader_in_flight() {
        let batcher = MediaGroupBatcher::new(Duration::from_secs(1));
        let _leader = batcher.claim(key(9)).unwrap();
        assert!(batcher.claim(key(9)).is_none());
        assert_eq!(batcher.in_flight(), 1);

        tokio::time::advance(DONE_RETENTION + Duration::from_secs(1)).await;
        assert!(batcher.claim(key(9)).is_none());
        assert_eq!(batcher.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_elapses_on_the_clock() {
        let batcher = MediaGroupBatcher::new(Duration::from_millis(1000));
        let start = Instant::now();
        batcher.wait_window().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
