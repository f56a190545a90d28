use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use review_portal::config::{Config, VerificationMode};
use review_portal::db;
use review_portal::db_storage::PgReviewStore;
use review_portal::handlers::AppState;
use review_portal::rotation::{spawn_rotation, Spotlight};
use review_portal::routes;
use review_portal::store::{MemoryReviewStore, ReviewStore};
use review_portal::verification::{ConsignmentRegistry, ConsignmentVerifier};

/// Main entry point for the review portal.
///
/// Initializes tracing and configuration, connects the review store (PostgreSQL
/// when configured, memory otherwise), starts the change listener and the
/// spotlight rotation, then serves the HTTP API until Ctrl-C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "review_portal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let mut listener_task = None;
    let (store, registry): (Arc<dyn ReviewStore>, ConsignmentRegistry) =
        match config.database_url.as_deref() {
            Some(url) => {
                let database = db::shared(url).await?;
                tracing::info!("Database connection pool established");

                let store = PgReviewStore::new(database.pool.clone()).await?;
                listener_task = Some(store.spawn_listener().await?);

                let registry = match config.verification_mode {
                    VerificationMode::Registry => {
                        ConsignmentRegistry::Database(database.pool.clone())
                    }
                    VerificationMode::Disabled => ConsignmentRegistry::Disabled,
                };
                let store: Arc<dyn ReviewStore> = Arc::new(store);
                (store, registry)
            }
            None => {
                let registry = match config.verification_mode {
                    VerificationMode::Registry => {
                        tracing::warn!(
                            "VERIFICATION_MODE=registry needs a database; using an empty registry"
                        );
                        ConsignmentRegistry::Fixed(HashSet::new())
                    }
                    VerificationMode::Disabled => ConsignmentRegistry::Disabled,
                };
                let store: Arc<dyn ReviewStore> = Arc::new(MemoryReviewStore::new());
                (store, registry)
            }
        };
    tracing::info!("Review store ready: {}", store.backend());

    let verifier = ConsignmentVerifier::new(registry, config.verification_cache_ttl)?;
    tracing::info!(
        "Consignment verification initialized ({:?} TTL)",
        config.verification_cache_ttl
    );

    let spotlight = Arc::new(Spotlight::new());
    let rotation = spawn_rotation(spotlight.clone(), store.feed(), config.spotlight_interval);

    let app_state = Arc::new(AppState {
        store,
        verifier,
        spotlight,
        config: config.clone(),
    });

    let app = routes::router(app_state, true)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    rotation.stop();
    if let Some(task) = listener_task {
        task.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
