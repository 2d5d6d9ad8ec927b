//! Environment driven settings.
//!
//! Everything is read from environment variables (optionally via `.env`).
//! Only `OPENSEARCH_URL` is mandatory, and not even that for dry runs.

use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::HotspotConfig;
use crate::services::document_store::DocumentStore;
use crate::services::memory_store::{InMemoryDocumentStore, InMemoryWatermarkStore};
use crate::services::opensearch::OpenSearchStore;
use crate::services::watermark_store::{
    CoverageStore, DocumentWatermarkStore, PgWatermarkStore, WatermarkStore,
};

const ENV_HELIUM_API_ENDPOINTS: &str = "HELIUM_API_ENDPOINTS";
const ENV_HOTSPOT_CONFIG_PATH: &str = "HOTSPOT_CONFIG_PATH";
const ENV_OPENSEARCH_URL: &str = "OPENSEARCH_URL";
const ENV_OPENSEARCH_USERNAME: &str = "OPENSEARCH_USERNAME";
const ENV_OPENSEARCH_PASSWORD: &str = "OPENSEARCH_PASSWORD";
const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_COINGECKO_BASE_URL: &str = "COINGECKO_BASE_URL";
const ENV_COINGECKO_API_KEY: &str = "COINGECKO_API_KEY";
const ENV_COINGECKO_REQUEST_DELAY_MS: &str = "COINGECKO_REQUEST_DELAY_MS";
const ENV_REFERENCE_COIN: &str = "REFERENCE_COIN";
const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
const ENV_SYNC_INTERVAL_SECS: &str = "SYNC_INTERVAL_SECS";
const ENV_SYNC_DETECT_CHANGES: &str = "SYNC_DETECT_CHANGES";
const ENV_SYNC_DRY_RUN: &str = "SYNC_DRY_RUN";

const DEFAULT_HELIUM_API_ENDPOINTS: &str =
    "https://api.helium.io/v1/hotspots/,https://helium-api.stakejoy.com/v1/hotspots/";
const DEFAULT_HOTSPOT_CONFIG_PATH: &str = "/data/config.json";
const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_REFERENCE_COIN: &str = "helium";
/// Keeps the public CoinGecko tier under its per-minute limit
const DEFAULT_COINGECKO_REQUEST_DELAY_MS: u64 = 1500;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub helium_endpoints: Vec<String>,
    pub hotspot_config_path: PathBuf,
    pub opensearch_url: Option<String>,
    pub opensearch_credentials: Option<(String, String)>,
    /// Postgres watermarks when set, document-store watermarks otherwise
    pub database_url: Option<String>,
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,
    pub coingecko_request_delay: Duration,
    pub reference_coin: String,
    pub http_timeout: Duration,
    /// Run repeatedly on this interval instead of once
    pub sync_interval: Option<Duration>,
    pub detect_changes: bool,
    pub dry_run: bool,
}

impl Settings {
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let helium_endpoints: Vec<String> = non_empty(ENV_HELIUM_API_ENDPOINTS)
            .unwrap_or_else(|| DEFAULT_HELIUM_API_ENDPOINTS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if helium_endpoints.is_empty() {
            return Err(SyncError::Config(format!(
                "{} lists no endpoints",
                ENV_HELIUM_API_ENDPOINTS
            )));
        }

        let dry_run = parse_flag(non_empty(ENV_SYNC_DRY_RUN));

        let opensearch_url = non_empty(ENV_OPENSEARCH_URL);
        if opensearch_url.is_none() && !dry_run {
            return Err(SyncError::Config(format!(
                "{} must be set unless {} is enabled",
                ENV_OPENSEARCH_URL, ENV_SYNC_DRY_RUN
            )));
        }

        let opensearch_credentials =
            match (non_empty(ENV_OPENSEARCH_USERNAME), non_empty(ENV_OPENSEARCH_PASSWORD)) {
                (Some(user), Some(password)) => Some((user, password)),
                (None, None) => None,
                _ => {
                    return Err(SyncError::Config(format!(
                        "{} and {} must be set together",
                        ENV_OPENSEARCH_USERNAME, ENV_OPENSEARCH_PASSWORD
                    )))
                }
            };

        let sync_interval = parse_number::<u64>(ENV_SYNC_INTERVAL_SECS, non_empty(ENV_SYNC_INTERVAL_SECS))?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            helium_endpoints,
            hotspot_config_path: non_empty(ENV_HOTSPOT_CONFIG_PATH)
                .unwrap_or_else(|| DEFAULT_HOTSPOT_CONFIG_PATH.to_string())
                .into(),
            opensearch_url,
            opensearch_credentials,
            database_url: non_empty(ENV_DATABASE_URL),
            coingecko_base_url: non_empty(ENV_COINGECKO_BASE_URL)
                .unwrap_or_else(|| DEFAULT_COINGECKO_BASE_URL.to_string()),
            coingecko_api_key: non_empty(ENV_COINGECKO_API_KEY),
            coingecko_request_delay: Duration::from_millis(
                parse_number(ENV_COINGECKO_REQUEST_DELAY_MS, non_empty(ENV_COINGECKO_REQUEST_DELAY_MS))?
                    .unwrap_or(DEFAULT_COINGECKO_REQUEST_DELAY_MS),
            ),
            reference_coin: non_empty(ENV_REFERENCE_COIN)
                .unwrap_or_else(|| DEFAULT_REFERENCE_COIN.to_string()),
            http_timeout: Duration::from_secs(
                parse_number(ENV_HTTP_TIMEOUT_SECS, non_empty(ENV_HTTP_TIMEOUT_SECS))?
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            sync_interval,
            detect_changes: parse_flag(non_empty(ENV_SYNC_DETECT_CHANGES)),
            dry_run,
        })
    }
}

fn parse_flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> SyncResult<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| SyncError::Config(format!("{} is not a valid number: '{}'", key, v)))
        })
        .transpose()
}

/// Backends selected by the settings.
pub struct Stores {
    pub documents: Arc<dyn DocumentStore>,
    pub watermarks: Arc<dyn WatermarkStore>,
    pub coverage: Arc<dyn CoverageStore>,
}

/// Connect the document store and pick the watermark backend: in-memory for
/// dry runs, Postgres when `DATABASE_URL` is set, the document store otherwise.
pub async fn connect_stores(settings: &Settings) -> SyncResult<Stores> {
    if settings.dry_run {
        warn!("DRY RUN: documents and watermarks are kept in memory only");
        let watermarks = Arc::new(InMemoryWatermarkStore::new());
        return Ok(Stores {
            documents: Arc::new(InMemoryDocumentStore::new()),
            watermarks: watermarks.clone(),
            coverage: watermarks,
        });
    }

    let opensearch_url = settings
        .opensearch_url
        .clone()
        .ok_or_else(|| SyncError::Config(format!("{} must be set", ENV_OPENSEARCH_URL)))?;

    let documents: Arc<dyn DocumentStore> = Arc::new(OpenSearchStore::new(
        opensearch_url,
        settings.opensearch_credentials.clone(),
        settings.http_timeout,
    )?);

    match &settings.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db = Database::connect(database_url).await?;

            info!("Running migrations...");
            migration::Migrator::up(&db, None).await?;

            let watermarks = Arc::new(PgWatermarkStore::new(db));
            Ok(Stores {
                documents,
                watermarks: watermarks.clone(),
                coverage: watermarks,
            })
        }
        None => {
            info!("DATABASE_URL not set, keeping watermarks in the document store");
            let watermarks = Arc::new(DocumentWatermarkStore::new(documents.clone()));
            Ok(Stores {
                documents,
                watermarks: watermarks.clone(),
                coverage: watermarks,
            })
        }
    }
}

/// Load the tracked hotspots and their antenna history.
pub fn load_hotspots(path: &Path) -> SyncResult<Vec<HotspotConfig>> {
    let contents = std::fs::read_to_string(path)?;
    let hotspots: Vec<HotspotConfig> = serde_json::from_str(&contents)?;

    info!("Loaded {} hotspots from {}", hotspots.len(), path.display());

    Ok(hotspots)
}

/// Round-robin over the configured upstream endpoints, one pick per run.
#[derive(Debug)]
pub struct EndpointRotation {
    endpoints: Vec<String>,
    next: AtomicUsize,
}

impl EndpointRotation {
    pub fn new(endpoints: Vec<String>, start: usize) -> Self {
        Self {
            endpoints,
            next: AtomicUsize::new(start),
        }
    }

    pub fn next_endpoint(&self) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Some(&self.endpoints[index])
    }
}
