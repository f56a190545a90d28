//! Live review feed.
//!
//! Stores publish the complete record set on every change; readers always see
//! the latest snapshot (last write wins). Subscribers register a callback that
//! receives each new snapshot until the subscription is cancelled.

use std::future::Future;
use std::sync::Arc;

use futures::stream::Stream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use crate::models::ReviewRecord;

/// Shared, immutable view of the full record set.
pub type Snapshot = Arc<Vec<ReviewRecord>>;

/// Latest-snapshot channel shared by a store and its readers.
#[derive(Clone)]
pub struct ReviewFeed {
    tx: Arc<watch::Sender<Snapshot>>,
    /// Held across load and publish so reloads never interleave.
    reload_gate: Arc<Mutex<()>>,
}

impl Default for ReviewFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            tx: Arc::new(tx),
            reload_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Replaces the current snapshot and wakes every subscriber.
    pub fn publish(&self, records: Vec<ReviewRecord>) {
        let count = records.len();
        self.tx.send_replace(Arc::new(records));
        tracing::debug!(
            "Published review snapshot ({} records, {} subscribers)",
            count,
            self.tx.receiver_count()
        );
    }

    /// Loads a fresh record set with `load` and publishes it.
    ///
    /// Reloads run one at a time, so a load that started earlier can never
    /// publish over the result of one that started later. Returns the number
    /// of records published.
    pub async fn reload<F, Fut, E>(&self, load: F) -> Result<usize, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ReviewRecord>, E>>,
    {
        let _gate = self.reload_gate.lock().await;
        let records = load().await?;
        let count = records.len();
        self.publish(records);
        Ok(count)
    }

    pub fn latest(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Stream yielding the current snapshot and then every replacement.
    ///
    /// Intermediate snapshots may be skipped when the consumer is slower than
    /// the publisher; only the newest one matters.
    pub fn stream(&self) -> impl Stream<Item = Snapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Invokes `callback` with every new snapshot until the returned
    /// subscription is cancelled or dropped.
    pub fn on_snapshot<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                callback(snapshot);
            }
        });
        Subscription { task }
    }
}

/// Handle for a callback registered with [`ReviewFeed::on_snapshot`].
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
