//! Spotlight rotation over verified reviews.
//!
//! [`next_index`] is the pure selector. [`Spotlight`] keeps the current
//! position and [`spawn_rotation`] advances it on a fixed period until the
//! returned handle is stopped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregation::verified_subset;
use crate::feed::ReviewFeed;
use crate::models::ReviewRecord;

/// Next position in a cyclic set of `set_size` items.
///
/// Returns `None` for an empty set: there is no valid index and the caller
/// must suppress the rotation.
pub fn next_index(current_index: usize, set_size: usize) -> Option<usize> {
    if set_size == 0 {
        return None;
    }
    // Reduce first so any index, including usize::MAX, advances without overflow.
    Some((current_index % set_size + 1) % set_size)
}

/// Current spotlight position, shared between the ticker and readers.
#[derive(Debug, Default)]
pub struct Spotlight {
    index: AtomicUsize,
}

impl Spotlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Advances over a verified set of `set_size` reviews.
    ///
    /// An empty set resets the position to 0 without invoking the selector.
    pub fn advance(&self, set_size: usize) -> Option<usize> {
        match next_index(self.index(), set_size) {
            Some(next) => {
                self.index.store(next, Ordering::Relaxed);
                Some(next)
            }
            None => {
                self.index.store(0, Ordering::Relaxed);
                None
            }
        }
    }

    /// Resolves the spotlighted review in a snapshot.
    ///
    /// Returns the effective index, the verified set size and the review.
    /// The stored index is reduced modulo the set size since the snapshot may
    /// have shrunk since the last tick.
    pub fn current<'a>(&self, records: &'a [ReviewRecord]) -> (usize, usize, Option<&'a ReviewRecord>) {
        let verified = verified_subset(records);
        if verified.is_empty() {
            return (0, 0, None);
        }
        let index = self.index() % verified.len();
        (index, verified.len(), Some(verified[index]))
    }
}

/// Cancels the rotation timer when stopped or dropped.
#[derive(Debug)]
pub struct RotationHandle {
    task: JoinHandle<()>,
}

impl RotationHandle {
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts advancing `spotlight` every `period` over the feed's latest
/// verified reviews.
pub fn spawn_rotation(
    spotlight: Arc<Spotlight>,
    feed: ReviewFeed,
    period: Duration,
) -> RotationHandle {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first review stays up for a full period.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let snapshot = feed.latest();
            let size = verified_subset(&snapshot).len();
            match spotlight.advance(size) {
                Some(index) => tracing::trace!("Spotlight advanced to {} of {}", index, size),
                None => tracing::trace!("Spotlight rotation suppressed: no verified reviews"),
            }
        }
    });

    tracing::debug!("Spotlight rotation started ({:?} period)", period);
    RotationHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceType;
    use uuid::Uuid;

    fn verified(flag: bool) -> ReviewRecord {
        ReviewRecord {
            id: Uuid::new_v4(),
            name: "Ravi".to_string(),
            pnr: "VRL1234".to_string(),
            from_location: None,
            to_location: None,
            service_type: ServiceType::BikeTransport,
            rating: 5,
            comment: "Great".to_string(),
            user_id: "anonymous".to_string(),
            created_at: None,
            verified: flag,
            admin_reply: None,
        }
    }

    #[test]
    fn test_next_index_wraps() {
        assert_eq!(next_index(0, 3), Some(1));
        assert_eq!(next_index(2, 3), Some(0));
        assert_eq!(next_index(0, 1), Some(0));
    }

    #[test]
    fn test_next_index_out_of_range_current() {
        assert_eq!(next_index(usize::MAX, 3), Some(1));
        assert_eq!(next_index(usize::MAX, 1), Some(0));
        assert_eq!(next_index(10, 4), Some(3));
    }

    #[test]
    fn test_next_index_empty_set() {
        assert_eq!(next_index(0, 0), None);
        assert_eq!(next_index(7, 0), None);
    }

    #[test]
    fn test_next_index_visits_every_index_once_per_cycle() {
        let size = 7;
        let mut seen = Vec::new();
        let mut index = 0;
        for _ in 0..size {
            index = next_index(index, size).unwrap();
            seen.push(index);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..size).collect::<Vec<_>>());
        assert_eq!(index, 0);
    }

    #[test]
    fn test_spotlight_advance_resets_on_empty() {
        let spotlight = Spotlight::new();
        assert_eq!(spotlight.advance(3), Some(1));
        assert_eq!(spotlight.advance(3), Some(2));
        assert_eq!(spotlight.advance(0), None);
        assert_eq!(spotlight.index(), 0);
    }

    #[test]
    fn test_spotlight_current_clamps_after_shrink() {
        let spotlight = Spotlight::new();
        spotlight.advance(5);
        spotlight.advance(5);
        spotlight.advance(5);
        assert_eq!(spotlight.index(), 3);

        let records = vec![verified(true), verified(false), verified(true)];
        let (index, size, review) = spotlight.current(&records);
        assert_eq!(size, 2);
        assert_eq!(index, 1);
        assert_eq!(review.map(|r| r.id), Some(records[2].id));
    }

    #[test]
    fn test_spotlight_current_without_verified() {
        let spotlight = Spotlight::new();
        let records = vec![verified(false)];
        assert_eq!(spotlight.current(&records), (0, 0, None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_ticks_and_stops() {
        let feed = ReviewFeed::new();
        feed.publish(vec![verified(true), verified(true), verified(true)]);
        let spotlight = Arc::new(Spotlight::new());

        let handle = spawn_rotation(spotlight.clone(), feed.clone(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(spotlight.index(), 1);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(spotlight.index(), 2);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(spotlight.index(), 2);
        assert!(handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_suppressed_without_verified_reviews() {
        let feed = ReviewFeed::new();
        feed.publish(vec![verified(false)]);
        let spotlight = Arc::new(Spotlight::new());

        let _handle = spawn_rotation(spotlight.clone(), feed, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(spotlight.index(), 0);
    }
}
