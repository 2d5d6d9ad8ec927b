use chrono::NaiveDate;
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hotspot_sync::config::{connect_stores, Settings};
use hotspot_sync::jobs::coin_history_sync::CoinHistorySync;
use hotspot_sync::services::coingecko::CoinGeckoService;

/// Fill a coin's daily history over an explicit range.
///
/// Usage: backfill_coin_history <coin_id> <from YYYY-MM-DD> <to YYYY-MM-DD>
///
/// `to` is exclusive, matching the stored coverage range.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("Usage: {} <coin_id> <from YYYY-MM-DD> <to YYYY-MM-DD>", args[0]);
        std::process::exit(1);
    }

    let coin_id = &args[1];
    let from = NaiveDate::parse_from_str(&args[2], "%Y-%m-%d")?;
    let to = NaiveDate::parse_from_str(&args[3], "%Y-%m-%d")?;

    let settings = Settings::from_env()?;
    let stores = connect_stores(&settings).await?;

    let prices = Arc::new(CoinGeckoService::new(
        settings.coingecko_api_key.clone(),
        settings.coingecko_base_url.clone(),
        settings.http_timeout,
    )?);

    let coin_sync = CoinHistorySync::new(prices, stores.documents, stores.coverage)
        .with_request_delay(settings.coingecko_request_delay);

    let report = coin_sync.fill(coin_id, from, to).await?;

    tracing::info!(
        "Backfill of {} done: {} written, {} already stored, {} failed; coverage [{}, {})",
        coin_id,
        report.written,
        report.existing,
        report.failed,
        report.coverage.earliest_date,
        report.coverage.latest_date
    );

    Ok(())
}
