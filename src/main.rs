use chrono::Utc;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotspot_sync::config::{connect_stores, load_hotspots, EndpointRotation, Settings, Stores};
use hotspot_sync::error::{SyncError, SyncResult};
use hotspot_sync::jobs::coin_history_sync::CoinHistorySync;
use hotspot_sync::jobs::hotspot_activity_sync::HotspotActivitySync;
use hotspot_sync::services::coingecko::CoinGeckoService;
use hotspot_sync::services::helium_api::HeliumApiService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hotspot_sync=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let stores = connect_stores(&settings).await?;

    // Spread one-shot runs across endpoints
    let rotation = EndpointRotation::new(
        settings.helium_endpoints.clone(),
        Utc::now().timestamp_subsec_nanos() as usize,
    );

    let Some(period) = settings.sync_interval else {
        run_once(&settings, &stores, &rotation).await?;
        return Ok(());
    };

    info!(interval_secs = period.as_secs(), "Starting periodic hotspot sync");

    let mut interval = interval(period);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping hotspot sync");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = run_once(&settings, &stores, &rotation).await {
                    error!("Hotspot sync run failed: {}", e);
                }
            }
        }
    }

    Ok(())
}

/// One full pass: hotspot activity first, then the reference coin history
/// back to the oldest hotspot's birth.
async fn run_once(
    settings: &Settings,
    stores: &Stores,
    rotation: &EndpointRotation,
) -> SyncResult<()> {
    let run_at = Utc::now();
    let hotspots = load_hotspots(&settings.hotspot_config_path)?;

    let endpoint = rotation
        .next_endpoint()
        .ok_or_else(|| SyncError::Config("no Helium API endpoint configured".to_string()))?;
    info!(endpoint = %endpoint, "Using Helium API endpoint");

    let source = Arc::new(HeliumApiService::new(
        endpoint.to_string(),
        settings.http_timeout,
    )?);

    let hotspot_sync = HotspotActivitySync::new(
        source,
        stores.watermarks.clone(),
        stores.documents.clone(),
    )
    .with_change_detection(settings.detect_changes);

    let summary = hotspot_sync.process_hotspots(&hotspots, run_at).await;

    let prices = Arc::new(CoinGeckoService::new(
        settings.coingecko_api_key.clone(),
        settings.coingecko_base_url.clone(),
        settings.http_timeout,
    )?);

    let coin_sync = CoinHistorySync::new(
        prices,
        stores.documents.clone(),
        stores.coverage.clone(),
    )
    .with_request_delay(settings.coingecko_request_delay);

    coin_sync
        .fill(
            &settings.reference_coin,
            summary.earliest_born_at.date_naive(),
            run_at.date_naive(),
        )
        .await?;

    Ok(())
}
