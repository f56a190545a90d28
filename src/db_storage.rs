use async_trait::async_trait;
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::circuit_breaker::{create_store_circuit_breaker, StoreCircuitBreaker};
use crate::db::REVIEWS_CHANNEL;
use crate::documents::{coerce_snapshot, document_body, StoredDocument};
use crate::errors::AppError;
use crate::feed::ReviewFeed;
use crate::models::{NewReview, ReviewRecord};
use crate::store::{pending_record, ReviewStore};

/// Review store backed by the `reviews` JSONB document table.
pub struct PgReviewStore {
    pool: PgPool,
    feed: ReviewFeed,
    breaker: Arc<StoreCircuitBreaker>,
}

impl PgReviewStore {
    /// Creates the store and publishes the initial snapshot.
    pub async fn new(pool: PgPool) -> Result<Self, AppError> {
        let store = Self {
            pool,
            feed: ReviewFeed::new(),
            breaker: Arc::new(create_store_circuit_breaker()),
        };
        store.refresh().await?;
        Ok(store)
    }

    /// Reloads the full snapshot and publishes it.
    ///
    /// Shares the feed's reload gate with the change listener, so the last
    /// published snapshot always comes from the most recently started load.
    pub async fn refresh(&self) -> Result<usize, AppError> {
        let pool = self.pool.clone();
        self.guarded(self.feed.reload(|| load_snapshot(pool))).await
    }

    /// Starts republishing the snapshot on every `reviews_changed`
    /// notification. Aborting the handle stops the listener.
    ///
    /// Notifications sent while the listener connection is down are lost, so
    /// a lost connection also triggers a reload.
    pub async fn spawn_listener(&self) -> Result<JoinHandle<()>, AppError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(REVIEWS_CHANNEL).await?;
        tracing::info!("Listening for review changes on '{}'", REVIEWS_CHANNEL);

        let pool = self.pool.clone();
        let feed = self.feed.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.try_recv().await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        // try_recv reconnects on the next call.
                        tracing::warn!("Review change listener lost its connection; reloading");
                    }
                    Err(e) => {
                        tracing::warn!("Review change listener error: {}", e);
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                }

                let pool = pool.clone();
                match feed.reload(|| load_snapshot(pool)).await {
                    Ok(count) => tracing::debug!("Review snapshot reloaded ({} records)", count),
                    Err(e) => tracing::error!("Failed to reload review snapshot: {}", e),
                }
            }
        });

        Ok(handle)
    }

    async fn guarded<T, F>(&self, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        self.breaker.call(operation).await.map_err(|e| match e {
            failsafe::Error::Rejected => {
                AppError::DataUnavailable("review store circuit breaker is open".to_string())
            }
            failsafe::Error::Inner(e) => AppError::DataUnavailable(format!("{}", e)),
        })
    }
}

async fn load_snapshot(pool: PgPool) -> Result<Vec<ReviewRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, Option<DateTime<Utc>>, Value)>(
        "SELECT id, created_at, doc FROM reviews ORDER BY created_at DESC NULLS FIRST",
    )
    .fetch_all(&pool)
    .await?;

    let docs: Vec<StoredDocument> = rows
        .into_iter()
        .map(|(id, created_at, body)| StoredDocument {
            id,
            created_at,
            body,
        })
        .collect();

    Ok(coerce_snapshot(&docs))
}

async fn insert_document(
    pool: PgPool,
    body: Value,
) -> Result<(Uuid, DateTime<Utc>), sqlx::Error> {
    sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
        "INSERT INTO reviews (doc) VALUES ($1) RETURNING id, created_at",
    )
    .bind(body)
    .fetch_one(&pool)
    .await
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn submit(
        &self,
        review: NewReview,
        user_id: &str,
        verified: bool,
    ) -> Result<ReviewRecord, AppError> {
        let mut record = pending_record(review, user_id, verified);
        let body = document_body(&record);

        let (id, created_at) = self.guarded(insert_document(self.pool.clone(), body)).await?;
        record.id = id;
        record.created_at = Some(created_at);
        tracing::info!("Stored review {} (verified: {})", id, verified);

        // The listener republishes too; refreshing here keeps the feed current
        // for this instance even if notifications lag.
        if let Err(e) = self.refresh().await {
            tracing::warn!("Snapshot refresh after submit failed: {}", e);
        }

        Ok(record)
    }

    async fn snapshot(&self) -> Result<Vec<ReviewRecord>, AppError> {
        self.guarded(load_snapshot(self.pool.clone())).await
    }

    fn feed(&self) -> ReviewFeed {
        self.feed.clone()
    }
}
