use moka::future::Cache;
use regex::Regex;
use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::{AppError, ResultExt};

/// Where consignment references are looked up.
#[derive(Clone)]
pub enum ConsignmentRegistry {
    /// `consignments` table keyed by normalized PNR.
    Database(PgPool),
    /// Fixed set of normalized PNRs.
    Fixed(HashSet<String>),
    /// No registry configured; nothing is verified.
    Disabled,
}

/// Decides the `verified` flag of a new review by matching its consignment
/// reference against real shipments.
#[derive(Clone)]
pub struct ConsignmentVerifier {
    registry: ConsignmentRegistry,
    pnr_shape: Regex,
    /// Key: normalized PNR, Value: whether the registry knows it.
    cache: Cache<String, bool>,
}

impl ConsignmentVerifier {
    /// Creates a verifier over `registry`, caching answers for `cache_ttl`.
    pub fn new(registry: ConsignmentRegistry, cache_ttl: Duration) -> Result<Self, AppError> {
        let pnr_shape = Regex::new(r"^[A-Z0-9]{4,20}$")
            .map_err(|e| AppError::InternalError(format!("Invalid PNR pattern: {}", e)))?;

        let cache = Cache::builder()
            .time_to_live(cache_ttl)
            .max_capacity(50_000)
            .build();

        Ok(Self {
            registry,
            pnr_shape,
            cache,
        })
    }

    /// Uppercases and strips spaces/dashes. `None` when the result does not
    /// look like a consignment number.
    pub fn normalize_pnr(&self, pnr: &str) -> Option<String> {
        let normalized: String = pnr
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        self.pnr_shape.is_match(&normalized).then_some(normalized)
    }

    /// Whether `pnr` refers to a known shipment.
    pub async fn verify(&self, pnr: &str) -> Result<bool, AppError> {
        let Some(normalized) = self.normalize_pnr(pnr) else {
            tracing::debug!("PNR '{}' is malformed; review stays unverified", pnr);
            return Ok(false);
        };

        if let Some(known) = self.cache.get(&normalized).await {
            tracing::debug!("PNR {} verification cache hit: {}", normalized, known);
            return Ok(known);
        }

        let known = match &self.registry {
            ConsignmentRegistry::Database(pool) => {
                sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM consignments WHERE pnr = $1)",
                )
                .bind(&normalized)
                .fetch_one(pool)
                .await
                .with_context(|| format!("Consignment lookup failed for {}", normalized))?
            }
            ConsignmentRegistry::Fixed(known) => known.contains(&normalized),
            ConsignmentRegistry::Disabled => return Ok(false),
        };

        self.cache.insert(normalized.clone(), known).await;
        tracing::info!("PNR {} verified: {}", normalized, known);
        Ok(known)
    }
}
