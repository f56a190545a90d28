use crate::aggregation::{aggregate, compute_statistics};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::identity::Identity;
use crate::models::*;
use crate::rotation::Spotlight;
use crate::store::ReviewStore;
use crate::verification::ConsignmentVerifier;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Review store; its feed holds the latest snapshot.
    pub store: Arc<dyn ReviewStore>,
    /// Decides the `verified` flag of submissions.
    pub verifier: ConsignmentVerifier,
    /// Current spotlight position, advanced by the rotation task.
    pub spotlight: Arc<Spotlight>,
    /// Application configuration.
    pub config: Config,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "review-portal",
            "version": env!("CARGO_PKG_VERSION"),
            "store": state.store.backend(),
            "reviews": state.store.feed().latest().len(),
        })),
    )
}

/// GET /api/v1/reviews
///
/// Filtered and sorted review list plus statistics over every review.
///
/// # Arguments
///
/// * `params` - `category` (or "All"), `sort` (Newest | Highest | Lowest), `verified_only`.
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeedQueryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let view = params.into_view()?;
    tracing::debug!("GET /reviews - view: {:?}", view);

    let snapshot = state.store.feed().latest();
    let result = aggregate(&snapshot, &view);

    let body = serde_json::to_value(FeedResponse {
        reviews: result.display_list,
        stats: result.stats,
    })?;
    Ok(Json(body))
}

/// GET /api/v1/reviews/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.store.feed().latest();
    Json(compute_statistics(&snapshot).into())
}

/// POST /api/v1/reviews
///
/// Validates the submission, decides `verified` from the consignment
/// reference, and hands the review to the store. The store assigns `id` and
/// `createdAt`.
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let review = review.validate()?;
    tracing::info!(
        "POST /reviews - service: {}, rating: {}, user: {}",
        review.service_type,
        review.rating,
        identity.user_id()
    );

    let verified = match state.verifier.verify(&review.pnr).await {
        Ok(verified) => verified,
        Err(e) => {
            // Verification is best effort; the review is still accepted.
            tracing::warn!("Consignment verification failed for {}: {}", review.pnr, e);
            false
        }
    };

    let pnr = review.pnr.clone();
    let record = state
        .store
        .submit(review, identity.user_id(), verified)
        .await
        .with_context(|| format!("Failed to store review for consignment {}", pnr))?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: "Review submitted successfully!".to_string(),
            review: record,
        }),
    ))
}

/// GET /api/v1/reviews/spotlight
///
/// The verified review currently shown by the rotating carousel.
pub async fn get_spotlight(State(state): State<Arc<AppState>>) -> Json<SpotlightResponse> {
    let snapshot = state.store.feed().latest();
    let (index, size, review) = state.spotlight.current(&snapshot);

    Json(SpotlightResponse {
        index,
        size,
        review: review.cloned(),
    })
}

/// GET /api/v1/service-types
///
/// Category filter values in display order, starting with "All".
pub async fn service_types() -> Json<Vec<String>> {
    let categories = std::iter::once(ALL_CATEGORIES.to_string())
        .chain(ServiceType::KNOWN.iter().map(|s| s.as_str().to_string()))
        .collect();
    Json(categories)
}

/// GET /api/v1/reviews/stream
///
/// Server-sent events carrying the full review set and statistics on every
/// change, starting with the current snapshot.
pub async fn stream_reviews(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("Review stream client connected");

    let stream = state.store.feed().stream().filter_map(|snapshot| async move {
        let payload = json!({
            "reviews": &*snapshot,
            "stats": compute_statistics(&snapshot),
        });
        match Event::default().event("snapshot").json_data(payload) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!("Failed to encode review snapshot event: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
