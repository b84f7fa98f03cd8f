//! Configuration module
//!
//! Environment-driven configuration for the ingestion service: HTTP surface,
//! storage root, catalog backend, upload limits, worker pool and retention sweep.

use chrono::NaiveTime;
use std::env;
use std::path::PathBuf;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const STORAGE_ROOT: &str = "./data/uploads";
const MAX_UPLOAD_SIZE_MB: u64 = 20 * 1024;
const MAX_CHUNK_SIZE_MB: u64 = 100;
const MAX_CHUNK_COUNT: u32 = 10_000;
const CHUNK_SESSION_TTL_HOURS: i64 = 24;
const SWEEP_TIME_UTC: &str = "03:00";
const GROUP_GRACE_HOURS: i64 = 24;

/// Settings of the remote video metadata API used by the enrichment plugin.
#[derive(Clone, Debug)]
pub struct EnrichmentApiConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Clone, Debug)]
pub struct StowageConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub storage_root: PathBuf,
    /// PostgreSQL catalog; the in-memory catalog is used when unset.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub worker_concurrency: usize,
    pub max_upload_size_bytes: u64,
    pub max_chunk_size_bytes: u64,
    pub max_chunk_count: u32,
    pub chunk_session_ttl_hours: i64,
    pub sweep_time_utc: NaiveTime,
    pub group_grace_hours: i64,
    pub enrichment_api: Option<EnrichmentApiConfig>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<StowageConfig>);

impl Config {
    fn inner(&self) -> &StowageConfig {
        &self.0
    }

    pub fn new(inner: StowageConfig) -> Self {
        Config(Box::new(inner))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.inner().environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config::new(StowageConfig::from_env()?))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().cors_origins
    }

    pub fn storage_root(&self) -> &PathBuf {
        &self.inner().storage_root
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().jwt_secret
    }

    pub fn worker_concurrency(&self) -> usize {
        self.inner().worker_concurrency
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.inner().max_upload_size_bytes
    }

    pub fn max_chunk_size_bytes(&self) -> u64 {
        self.inner().max_chunk_size_bytes
    }

    pub fn max_chunk_count(&self) -> u32 {
        self.inner().max_chunk_count
    }

    pub fn chunk_session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.inner().chunk_session_ttl_hours)
    }

    pub fn sweep_time_utc(&self) -> NaiveTime {
        self.inner().sweep_time_utc
    }

    pub fn group_grace(&self) -> chrono::Duration {
        chrono::Duration::hours(self.inner().group_grace_hours)
    }

    pub fn enrichment_api(&self) -> Option<&EnrichmentApiConfig> {
        self.inner().enrichment_api.as_ref()
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn default_worker_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Parse a wall-clock `HH:MM` time.
pub fn parse_sweep_time(value: &str) -> Result<NaiveTime, anyhow::Error> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| anyhow::anyhow!("SWEEP_TIME_UTC must be HH:MM, got '{}': {}", value, e))
}

impl StowageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let enrichment_api = match (
            env::var("ENRICHMENT_API_URL").ok().filter(|s| !s.is_empty()),
            env::var("ENRICHMENT_API_KEY").ok().filter(|s| !s.is_empty()),
        ) {
            (Some(base_url), Some(api_key)) => Some(EnrichmentApiConfig { base_url, api_key }),
            _ => None,
        };

        let sweep_time_utc = parse_sweep_time(
            &env::var("SWEEP_TIME_UTC").unwrap_or_else(|_| SWEEP_TIME_UTC.to_string()),
        )?;

        Ok(StowageConfig {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            environment,
            cors_origins,
            storage_root: PathBuf::from(
                env::var("STORAGE_ROOT").unwrap_or_else(|_| STORAGE_ROOT.to_string()),
            ),
            database_url,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_worker_concurrency),
            max_upload_size_bytes: env::var("MAX_UPLOAD_SIZE_MB")
                .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(MAX_UPLOAD_SIZE_MB)
                * 1024
                * 1024,
            max_chunk_size_bytes: env::var("MAX_CHUNK_SIZE_MB")
                .unwrap_or_else(|_| MAX_CHUNK_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(MAX_CHUNK_SIZE_MB)
                * 1024
                * 1024,
            max_chunk_count: env::var("MAX_CHUNK_COUNT")
                .unwrap_or_else(|_| MAX_CHUNK_COUNT.to_string())
                .parse()
                .unwrap_or(MAX_CHUNK_COUNT),
            chunk_session_ttl_hours: env::var("CHUNK_SESSION_TTL_HOURS")
                .unwrap_or_else(|_| CHUNK_SESSION_TTL_HOURS.to_string())
                .parse()
                .unwrap_or(CHUNK_SESSION_TTL_HOURS),
            sweep_time_utc,
            group_grace_hours: env::var("GROUP_GRACE_HOURS")
                .unwrap_or_else(|_| GROUP_GRACE_HOURS.to_string())
                .parse()
                .unwrap_or(GROUP_GRACE_HOURS),
            enrichment_api,
        })
    }

    /// Configuration with defaults for everything but the storage root and JWT secret.
    pub fn with_defaults(storage_root: impl Into<PathBuf>, jwt_secret: impl Into<String>) -> Self {
        StowageConfig {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            storage_root: storage_root.into(),
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            jwt_secret: jwt_secret.into(),
            worker_concurrency: default_worker_concurrency(),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            max_chunk_size_bytes: MAX_CHUNK_SIZE_MB * 1024 * 1024,
            max_chunk_count: MAX_CHUNK_COUNT,
            chunk_session_ttl_hours: CHUNK_SESSION_TTL_HOURS,
            sweep_time_utc: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
            group_grace_hours: GROUP_GRACE_HOURS,
            enrichment_api: None,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if is_production_name(&self.environment) && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if is_production_name(&self.environment) && self.database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL is required in production; the in-memory catalog does not survive restarts"
            ));
        }

        if let Some(url) = &self.database_url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.worker_concurrency == 0 {
            return Err(anyhow::anyhow!("WORKER_CONCURRENCY must be at least 1"));
        }

        if self.max_chunk_count == 0 {
            return Err(anyhow::anyhow!("MAX_CHUNK_COUNT must be at least 1"));
        }

        if self.max_chunk_size_bytes == 0 || self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CHUNK_SIZE_MB and MAX_UPLOAD_SIZE_MB must be greater than 0"
            ));
        }

        if self.chunk_session_ttl_hours <= 0 || self.group_grace_hours < 0 {
            return Err(anyhow::anyhow!(
                "CHUNK_SESSION_TTL_HOURS must be positive and GROUP_GRACE_HOURS non-negative"
            ));
        }

        Ok(())
    }
}
