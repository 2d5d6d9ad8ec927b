use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::services::document_store::{DocumentStore, WriteOutcome};

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

/// OpenSearch/Elasticsearch backed [`DocumentStore`].
#[derive(Clone)]
pub struct OpenSearchStore {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl OpenSearchStore {
    pub fn new(
        base_url: String,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> SyncResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, collection: &str, action: &str, id: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, collection, action, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn exists(&self, collection: &str, id: &str) -> SyncResult<bool> {
        let url = self.url(collection, "_doc", id);
        let response = self.authorize(self.client.head(&url)).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SyncError::Store(format!(
                "HEAD {}/{} returned {}",
                collection, id, status
            ))),
        }
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> SyncResult<WriteOutcome> {
        let url = self.url(collection, "_create", id);
        let response = self
            .authorize(self.client.put(&url))
            .json(document)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let outcome = classify_create_response(status, &body).map_err(|e| {
            tracing::error!(
                collection = %collection,
                id = %id,
                status = status.as_u16(),
                "Document create failed"
            );
            e
        })?;

        if outcome == WriteOutcome::AlreadyExists {
            tracing::debug!(collection = %collection, id = %id, "Document already exists");
        }

        Ok(outcome)
    }

    async fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Value>> {
        let url = self.url(collection, "_doc", id);
        let response = self.authorize(self.client.get(&url)).send().await?;

        // Missing index and missing document both answer 404
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Store(format!(
                "GET {}/{} returned {}: {}",
                collection, id, status, body
            )));
        }

        let body: GetResponse = response.json().await?;
        Ok(if body.found { body.source } else { None })
    }

    async fn update(&self, collection: &str, id: &str, document: &Value) -> SyncResult<()> {
        let url = self.url(collection, "_doc", id);
        let response = self
            .authorize(self.client.put(&url))
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Store(format!(
                "PUT {}/{} returned {}: {}",
                collection, id, status, body
            )));
        }

        Ok(())
    }
}

/// Map a `_create` response onto a write outcome. A version conflict means
/// the document is already stored and counts as success.
fn classify_create_response(status: StatusCode, body: &str) -> SyncResult<WriteOutcome> {
    if status.is_success() {
        return Ok(WriteOutcome::Created);
    }

    if status == StatusCode::CONFLICT {
        let error_type = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["type"].as_str().map(str::to_string));

        if error_type.as_deref() == Some("version_conflict_engine_exception") {
            return Ok(WriteOutcome::AlreadyExists);
        }
    }

    Err(SyncError::Store(format!(
        "create returned {}: {}",
        status, body
    )))
}
