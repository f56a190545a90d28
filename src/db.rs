use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;

/// Review documents, the consignment registry, and change notification.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS reviews (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    doc JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS reviews_created_at_idx ON reviews (created_at DESC);

CREATE TABLE IF NOT EXISTS consignments (
    pnr TEXT PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE OR REPLACE FUNCTION notify_reviews_changed() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify('reviews_changed', '');
    RETURN NULL;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS reviews_changed ON reviews;
CREATE TRIGGER reviews_changed
    AFTER INSERT OR UPDATE OR DELETE ON reviews
    FOR EACH STATEMENT EXECUTE FUNCTION notify_reviews_changed();
"#;

/// Channel the review table trigger notifies on.
pub const REVIEWS_CHANNEL: &str = "reviews_changed";

pub struct Database {
    pub pool: PgPool,
}

static SHARED: OnceCell<Database> = OnceCell::const_new();

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::debug!("Review schema ensured");

        Ok(Self { pool })
    }
}

/// Process-wide database handle, connected on first use.
///
/// Later calls return the same handle regardless of the URL passed.
pub async fn shared(database_url: &str) -> anyhow::Result<&'static Database> {
    SHARED
        .get_or_try_init(|| Database::new(database_url))
        .await
}
