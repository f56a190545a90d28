use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

/// Maximum request body size (a review is a few kilobytes at most).
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Builds the portal router.
///
/// With `rate_limited`, `/api` routes are throttled per client IP using the
/// configured rate and burst. The server must then provide
/// `ConnectInfo<SocketAddr>`. The health check is never limited.
pub fn router(state: Arc<AppState>, rate_limited: bool) -> anyhow::Result<Router> {
    let mut api_routes = Router::new()
        .route(
            "/api/v1/reviews",
            get(handlers::list_reviews).post(handlers::submit_review),
        )
        .route("/api/v1/reviews/stats", get(handlers::get_stats))
        .route("/api/v1/reviews/spotlight", get(handlers::get_spotlight))
        .route("/api/v1/reviews/stream", get(handlers::stream_reviews))
        .route("/api/v1/service-types", get(handlers::service_types))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    if rate_limited {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(state.config.rate_limit_per_second)
                .burst_size(state.config.rate_limit_burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
        );
        api_routes = api_routes.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    Ok(app)
}
