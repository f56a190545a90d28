//! Review store seam.
//!
//! A store accepts submissions, assigns `id` and `createdAt`, and publishes the
//! complete record set to its [`ReviewFeed`] whenever it changes.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::documents::{coerce_snapshot, document_body, StoredDocument};
use crate::errors::AppError;
use crate::feed::ReviewFeed;
use crate::models::{NewReview, ReviewRecord};

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Persists a validated submission and returns the completed record.
    async fn submit(
        &self,
        review: NewReview,
        user_id: &str,
        verified: bool,
    ) -> Result<ReviewRecord, AppError>;

    /// Full current record set, newest first.
    async fn snapshot(&self) -> Result<Vec<ReviewRecord>, AppError>;

    /// Feed this store publishes snapshots to.
    fn feed(&self) -> ReviewFeed;
}

/// Record for a submission before the store assigns `id` and `createdAt`.
pub(crate) fn pending_record(review: NewReview, user_id: &str, verified: bool) -> ReviewRecord {
    ReviewRecord {
        id: Uuid::nil(),
        name: review.name,
        pnr: review.pnr,
        from_location: review.from_location,
        to_location: review.to_location,
        service_type: review.service_type,
        // Validated submissions carry 1..=5.
        rating: u8::try_from(review.rating).unwrap_or(0),
        comment: review.comment,
        user_id: user_id.to_string(),
        created_at: None,
        verified,
        admin_reply: None,
    }
}

/// Store keeping documents in process memory, newest first.
pub struct MemoryReviewStore {
    docs: RwLock<Vec<StoredDocument>>,
    feed: ReviewFeed,
}

impl Default for MemoryReviewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            feed: ReviewFeed::new(),
        }
    }

    /// Adds a raw document as if written by another client.
    pub async fn insert_document(&self, doc: StoredDocument) {
        let mut docs = self.docs.write().await;
        docs.insert(0, doc);
        self.feed.publish(coerce_snapshot(&docs));
    }

    /// Sets an administrator reply on an existing review, as the admin
    /// console does directly against the document store.
    pub async fn set_admin_reply(&self, id: Uuid, reply: &str) -> Result<(), AppError> {
        let mut docs = self.docs.write().await;
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Review with id {} not found", id)))?;

        let body = doc
            .body
            .as_object_mut()
            .ok_or_else(|| AppError::InternalError(format!("Review {} has no body", id)))?;
        body.insert("adminReply".to_string(), reply.into());

        self.feed.publish(coerce_snapshot(&docs));
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn submit(
        &self,
        review: NewReview,
        user_id: &str,
        verified: bool,
    ) -> Result<ReviewRecord, AppError> {
        let mut record = pending_record(review, user_id, verified);
        record.id = Uuid::new_v4();
        record.created_at = Some(Utc::now());

        let doc = StoredDocument {
            id: record.id,
            created_at: record.created_at,
            body: document_body(&record),
        };

        let mut docs = self.docs.write().await;
        docs.insert(0, doc);
        self.feed.publish(coerce_snapshot(&docs));
        tracing::info!("Stored review {} in memory ({} total)", record.id, docs.len());

        Ok(record)
    }

    async fn snapshot(&self) -> Result<Vec<ReviewRecord>, AppError> {
        Ok(coerce_snapshot(&self.docs.read().await))
    }

    fn feed(&self) -> ReviewFeed {
        self.feed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceType;
    use serde_json::json;

    fn submission(rating: i64) -> NewReview {
        NewReview {
            name: "Latha".to_string(),
            pnr: "VRL7777".to_string(),
            from_location: None,
            to_location: Some("Pune".to_string()),
            service_type: ServiceType::HouseholdShifting,
            rating,
            comment: "Smooth move".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_assigns_store_fields() {
        let store = MemoryReviewStore::new();
        let record = store.submit(submission(5), "uid-1", true).await.unwrap();

        assert_ne!(record.id, Uuid::nil());
        assert!(record.created_at.is_some());
        assert!(record.verified);
        assert_eq!(record.user_id, "uid-1");

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot, vec![record]);
    }

    #[tokio::test]
    async fn test_snapshot_is_newest_first_and_published() {
        let store = MemoryReviewStore::new();
        let first = store.submit(submission(3), "anonymous", false).await.unwrap();
        let second = store.submit(submission(4), "anonymous", false).await.unwrap();

        let latest = store.feed().latest();
        assert_eq!(
            latest.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn test_malformed_documents_skipped() {
        let store = MemoryReviewStore::new();
        store
            .insert_document(StoredDocument {
                id: Uuid::new_v4(),
                created_at: None,
                body: json!({ "rating": 4 }),
            })
            .await;
        store.submit(submission(2), "anonymous", false).await.unwrap();

        assert_eq!(store.snapshot().await.unwrap().len(), 1);
        assert_eq!(store.feed().latest().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_reply_is_republished() {
        let store = MemoryReviewStore::new();
        let record = store.submit(submission(1), "anonymous", false).await.unwrap();

        store.set_admin_reply(record.id, "Sorry, we will call you.").await.unwrap();
        assert_eq!(
            store.feed().latest()[0].admin_reply.as_deref(),
            Some("Sorry, we will call you.")
        );

        assert!(store.set_admin_reply(Uuid::new_v4(), "x").await.is_err());
    }
}
