use serde::Deserialize;
use std::time::Duration;

/// How the `verified` flag of new reviews is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Match the consignment reference against the consignment registry.
    Registry,
    /// Never verify.
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// PostgreSQL URL; without one the portal runs on the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub spotlight_interval: Duration,
    pub verification_mode: VerificationMode,
    pub verification_cache_ttl: Duration,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("DB_URL"))
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|url| {
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                }
                Ok(url)
            })
            .transpose()?;

        let verification_mode = match std::env::var("VERIFICATION_MODE") {
            Ok(mode) => match mode.trim() {
                "registry" => VerificationMode::Registry,
                "disabled" => VerificationMode::Disabled,
                other => anyhow::bail!(
                    "VERIFICATION_MODE must be 'registry' or 'disabled', got '{}'",
                    other
                ),
            },
            Err(_) if database_url.is_some() => VerificationMode::Registry,
            Err(_) => VerificationMode::Disabled,
        };

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            spotlight_interval: Duration::from_secs(positive_u64("SPOTLIGHT_INTERVAL_SECS", 5)?),
            verification_mode,
            verification_cache_ttl: Duration::from_secs(positive_u64(
                "VERIFICATION_CACHE_TTL_SECS",
                3600,
            )?),
            rate_limit_per_second: positive_u64("RATE_LIMIT_PER_SECOND", 10)?,
            rate_limit_burst: u32::try_from(positive_u64("RATE_LIMIT_BURST", 20)?)
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_BURST is too large"))?,
            database_url,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]),
            None => tracing::warn!("DATABASE_URL not set; reviews are kept in memory only"),
        }
        tracing::debug!("Verification mode: {:?}", config.verification_mode);
        tracing::debug!("Spotlight interval: {:?}", config.spotlight_interval);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 3000,
            spotlight_interval: Duration::from_secs(5),
            verification_mode: VerificationMode::Disabled,
            verification_cache_ttl: Duration::from_secs(3600),
            rate_limit_per_second: 10,
            rate_limit_burst: 20,
        }
    }
}

fn positive_u64(name: &str, default: u64) -> anyhow::Result<u64> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => anyhow::bail!("{} must be greater than zero", name),
        Ok(value) => Ok(value),
        Err(_) => anyhow::bail!("{} must be a positive integer, got '{}'", name, raw),
    }
}
