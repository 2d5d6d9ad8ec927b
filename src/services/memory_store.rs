//! Process-local stores used for dry runs and tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::SyncResult;
use crate::models::{CoinCoverage, HotspotWatermark};
use crate::services::document_store::{DocumentStore, WriteOutcome};
use crate::services::watermark_store::{CoverageStore, WatermarkStore};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Snapshot of `collection`, ordered by id.
    pub fn documents(&self, collection: &str) -> Vec<(String, Value)> {
        self.collections
            .lock()
            .get(collection)
            .map(|docs| docs.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn exists(&self, collection: &str, id: &str) -> SyncResult<bool> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id)))
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> SyncResult<WriteOutcome> {
        let mut collections = self.collections.lock();
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.contains_key(id) {
            return Ok(WriteOutcome::AlreadyExists);
        }

        docs.insert(id.to_string(), document.clone());
        Ok(WriteOutcome::Created)
    }

    async fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Value>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn update(&self, collection: &str, id: &str, document: &Value) -> SyncResult<()> {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWatermarkStore {
    hotspots: Mutex<HashMap<String, HotspotWatermark>>,
    coins: Mutex<HashMap<String, CoinCoverage>>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get(&self, address: &str) -> SyncResult<Option<HotspotWatermark>> {
        Ok(self.hotspots.lock().get(address).cloned())
    }

    async fn create(&self, watermark: &HotspotWatermark) -> SyncResult<HotspotWatermark> {
        Ok(self
            .hotspots
            .lock()
            .entry(watermark.address.clone())
            .or_insert_with(|| watermark.clone())
            .clone())
    }

    async fn update(&self, watermark: &HotspotWatermark) -> SyncResult<()> {
        let mut hotspots = self.hotspots.lock();
        match hotspots.get_mut(&watermark.address) {
            Some(stored) if stored.processed_at <= watermark.processed_at => {
                stored.processed_at = watermark.processed_at;
                stored.activity_count = watermark.activity_count;
            }
            Some(_) => {}
            None => {
                hotspots.insert(watermark.address.clone(), watermark.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CoverageStore for InMemoryWatermarkStore {
    async fn get_or_create_coverage(
        &self,
        coin_id: &str,
        seed: NaiveDate,
    ) -> SyncResult<CoinCoverage> {
        Ok(self
            .coins
            .lock()
            .entry(coin_id.to_string())
            .or_insert_with(|| CoinCoverage::empty_at(coin_id, seed))
            .clone())
    }

    async fn update_coverage(&self, coverage: &CoinCoverage) -> SyncResult<()> {
        self.coins
            .lock()
            .insert(coverage.coin_id.clone(), coverage.clone());
        Ok(())
    }
}
