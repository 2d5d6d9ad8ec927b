use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::models::{ActivityPage, HotspotMetadata};
use crate::services::time_utils::{parse_utc, to_utc_string};

/// Upstream hotspot activity feed.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// `None` when the upstream does not know the hotspot.
    async fn get_metadata(&self, address: &str) -> SyncResult<Option<HotspotMetadata>>;

    async fn get_activity_count(&self, address: &str) -> SyncResult<i64>;

    /// First page of activity in `[min_time, max_time)`.
    async fn get_activity(
        &self,
        address: &str,
        min_time: DateTime<Utc>,
        max_time: DateTime<Utc>,
    ) -> SyncResult<ActivityPage>;

    /// Page following `cursor`.
    async fn get_activity_page(&self, address: &str, cursor: &str) -> SyncResult<ActivityPage>;
}

#[derive(Debug, Deserialize)]
struct HotspotResponse {
    data: Option<HotspotData>,
}

#[derive(Debug, Deserialize)]
struct HotspotData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    timestamp_added: String,
}

/// Helium hotspots API client bound to one base endpoint,
/// e.g. `https://api.helium.io/v1/hotspots/`.
#[derive(Clone)]
pub struct HeliumApiService {
    client: Client,
    endpoint: String,
}

impl HeliumApiService {
    pub fn new(endpoint: String, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: String) -> Self {
        let endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{}/", endpoint)
        };

        Self { client, endpoint }
    }

    fn hotspot_url(&self, address: &str) -> String {
        format!("{}{}", self.endpoint, address)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> SyncResult<T> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ActivitySource for HeliumApiService {
    async fn get_metadata(&self, address: &str) -> SyncResult<Option<HotspotMetadata>> {
        tracing::debug!(address = %address, "Fetching hotspot metadata");

        let url = self.hotspot_url(address);
        let response = self.client.get(&url).send().await?;

        // Unknown hotspots come back as 404 or as a body without `data`
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: HotspotResponse = response.json().await?;
        metadata_from_response(body)
    }

    async fn get_activity_count(&self, address: &str) -> SyncResult<i64> {
        let url = format!("{}/activity/count", self.hotspot_url(address));
        let body: Value = self.get_json(&url, &[]).await?;
        Ok(total_activity_count(&body))
    }

    async fn get_activity(
        &self,
        address: &str,
        min_time: DateTime<Utc>,
        max_time: DateTime<Utc>,
    ) -> SyncResult<ActivityPage> {
        let min_time = to_utc_string(min_time);
        let max_time = to_utc_string(max_time);

        tracing::debug!(
            address = %address,
            min_time = %min_time,
            max_time = %max_time,
            "Fetching hotspot activity"
        );

        let url = format!("{}/activity", self.hotspot_url(address));
        self.get_json(
            &url,
            &[
                ("filter_types", ""),
                ("min_time", min_time.as_str()),
                ("max_time", max_time.as_str()),
            ],
        )
        .await
    }

    async fn get_activity_page(&self, address: &str, cursor: &str) -> SyncResult<ActivityPage> {
        tracing::debug!(address = %address, "Following activity cursor");

        let url = format!("{}/activity", self.hotspot_url(address));
        self.get_json(&url, &[("cursor", cursor)]).await
    }
}

fn metadata_from_response(body: HotspotResponse) -> SyncResult<Option<HotspotMetadata>> {
    let Some(data) = body.data else {
        return Ok(None);
    };

    if data.name.is_empty() {
        return Ok(None);
    }

    let added_at = parse_utc(&data.timestamp_added).ok_or_else(|| {
        SyncError::InvalidTimestamp(format!(
            "timestamp_added '{}' for {}",
            data.timestamp_added, data.name
        ))
    })?;

    Ok(Some(HotspotMetadata {
        name: data.name,
        added_at,
    }))
}

/// The count endpoint reports per-type counters under `data`; a plain number
/// is accepted too.
fn total_activity_count(body: &Value) -> i64 {
    match body.get("data").unwrap_or(body) {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::Object(counts) => counts.values().filter_map(Value::as_i64).sum(),
        _ => 0,
    }
}
