use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::services::time_utils::coin_day_id;

/// Source of one-per-day historical snapshots for a coin.
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    async fn get_coin_history(&self, coin_id: &str, date: NaiveDate) -> SyncResult<Value>;
}

#[derive(Clone)]
pub struct CoinGeckoService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl CoinGeckoService {
    pub fn new(api_key: Option<String>, base_url: String, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PriceHistorySource for CoinGeckoService {
    /// Snapshot of `coin_id` (price, market cap, volume) at the given day.
    async fn get_coin_history(&self, coin_id: &str, date: NaiveDate) -> SyncResult<Value> {
        let day = coin_day_id(date);
        tracing::debug!("Fetching {} history for {} from CoinGecko", coin_id, day);

        let url = format!("{}/coins/{}/history", self.base_url, coin_id);

        let mut request = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&[("date", day.as_str()), ("localization", "false")]);

        if let Some(api_key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let document: Value = response.json().await?;

        if !document.is_object() {
            return Err(SyncError::UnexpectedResponse(format!(
                "unexpected CoinGecko history payload for {} on {}",
                coin_id, day
            )));
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_trimmed() {
        let service = CoinGeckoService::new(
            None,
            "https://api.coingecko.com/api/v3/".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(service.base_url(), "https://api.coingecko.com/api/v3");
    }
}
