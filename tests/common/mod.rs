#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hotspot_sync::error::{SyncError, SyncResult};
use hotspot_sync::models::{ActivityPage, HotspotMetadata};
use hotspot_sync::services::coingecko::PriceHistorySource;
use hotspot_sync::services::document_store::{DocumentStore, WriteOutcome};
use hotspot_sync::services::helium_api::ActivitySource;
use hotspot_sync::services::memory_store::InMemoryDocumentStore;

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Upstream activity record as the Helium API returns it.
pub fn activity(hash: &str, at: DateTime<Utc>) -> Value {
    json!({
        "hash": hash,
        "time": at.timestamp_millis(),
        "type": "poc_receipts_v1",
    })
}

/// In-process Helium API: serves stored records filtered by window, split
/// into cursor pages, with per-window failure injection.
pub struct ScriptedSource {
    metadata: HashMap<String, HotspotMetadata>,
    counts: HashMap<String, i64>,
    records: HashMap<String, Vec<Value>>,
    page_size: usize,
    failing_windows: Mutex<HashSet<DateTime<Utc>>>,
    windows: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
    count_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            metadata: HashMap::new(),
            counts: HashMap::new(),
            records: HashMap::new(),
            page_size: 100,
            failing_windows: Mutex::new(HashSet::new()),
            windows: Mutex::new(Vec::new()),
            count_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_hotspot(mut self, address: &str, name: &str, added_at: DateTime<Utc>) -> Self {
        self.metadata.insert(
            address.to_string(),
            HotspotMetadata {
                name: name.to_string(),
                added_at,
            },
        );
        self
    }

    pub fn with_records(mut self, address: &str, records: Vec<Value>) -> Self {
        self.counts.insert(address.to_string(), records.len() as i64);
        self.records.insert(address.to_string(), records);
        self
    }

    pub fn with_count(mut self, address: &str, count: i64) -> Self {
        self.counts.insert(address.to_string(), count);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Make every window starting at `min_time` fail on its first page.
    pub fn fail_window_at(&self, min_time: DateTime<Utc>) {
        self.failing_windows.lock().insert(min_time);
    }

    pub fn heal(&self) {
        self.failing_windows.lock().clear();
    }

    /// Windows requested so far, in order.
    pub fn windows(&self, address: &str) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.windows
            .lock()
            .iter()
            .filter(|(a, _, _)| a == address)
            .map(|(_, min, max)| (*min, *max))
            .collect()
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    fn in_window(&self, address: &str, min: i64, max: i64) -> Vec<Value> {
        self.records
            .get(address)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| {
                        let time = r["time"].as_i64().unwrap_or(i64::MIN);
                        time >= min && time < max
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn page(&self, address: &str, min: i64, max: i64, offset: usize) -> ActivityPage {
        let matching = self.in_window(address, min, max);
        let end = (offset + self.page_size).min(matching.len());
        let cursor = (end < matching.len()).then(|| format!("{}|{}|{}|{}", address, min, max, end));

        ActivityPage {
            data: matching[offset.min(end)..end].to_vec(),
            cursor,
        }
    }
}

#[async_trait]
impl ActivitySource for ScriptedSource {
    async fn get_metadata(&self, address: &str) -> SyncResult<Option<HotspotMetadata>> {
        Ok(self.metadata.get(address).cloned())
    }

    async fn get_activity_count(&self, address: &str) -> SyncResult<i64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.counts.get(address).copied().unwrap_or(0))
    }

    async fn get_activity(
        &self,
        address: &str,
        min_time: DateTime<Utc>,
        max_time: DateTime<Utc>,
    ) -> SyncResult<ActivityPage> {
        self.windows
            .lock()
            .push((address.to_string(), min_time, max_time));

        if self.failing_windows.lock().contains(&min_time) {
            return Err(SyncError::Api {
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }

        Ok(self.page(
            address,
            min_time.timestamp_millis(),
            max_time.timestamp_millis(),
            0,
        ))
    }

    async fn get_activity_page(&self, address: &str, cursor: &str) -> SyncResult<ActivityPage> {
        let parts: Vec<&str> = cursor.split('|').collect();
        let parsed = match parts.as_slice() {
            [a, min, max, offset] if *a == address => {
                match (min.parse::<i64>(), max.parse::<i64>(), offset.parse::<usize>()) {
                    (Ok(min), Ok(max), Ok(offset)) => Some((min, max, offset)),
                    _ => None,
                }
            }
            _ => None,
        };

        let (min, max, offset) =
            parsed.ok_or_else(|| SyncError::UnexpectedResponse(format!("bad cursor {}", cursor)))?;

        Ok(self.page(address, min, max, offset))
    }
}

/// Price history that fails on chosen days and records every request.
pub struct FlakyPrices {
    failing: Mutex<HashSet<NaiveDate>>,
    calls: Mutex<Vec<NaiveDate>>,
}

impl FlakyPrices {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(&self, day: NaiveDate) {
        self.failing.lock().insert(day);
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    pub fn calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PriceHistorySource for FlakyPrices {
    async fn get_coin_history(&self, coin_id: &str, date: NaiveDate) -> SyncResult<Value> {
        self.calls.lock().push(date);

        if self.failing.lock().contains(&date) {
            return Err(SyncError::Api {
                status: 429,
                body: "rate limited".to_string(),
            });
        }

        Ok(json!({
            "id": coin_id,
            "market_data": {"current_price": {"usd": 1.5}},
        }))
    }
}

/// Document store wrapper counting creates. With `blind_exists` the
/// existence shortcut always answers "absent", leaving duplicates to
/// `create_if_absent`. Chosen ids can be made to fail either call.
pub struct ObservedStore {
    pub inner: Arc<InMemoryDocumentStore>,
    blind_exists: bool,
    creates: AtomicUsize,
    failing_exists: Mutex<HashSet<String>>,
    failing_creates: Mutex<HashSet<String>>,
}

impl ObservedStore {
    pub fn new(inner: Arc<InMemoryDocumentStore>) -> Self {
        Self {
            inner,
            blind_exists: false,
            creates: AtomicUsize::new(0),
            failing_exists: Mutex::new(HashSet::new()),
            failing_creates: Mutex::new(HashSet::new()),
        }
    }

    pub fn blind(inner: Arc<InMemoryDocumentStore>) -> Self {
        Self {
            blind_exists: true,
            ..Self::new(inner)
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn fail_exists_for(&self, id: &str) {
        self.failing_exists.lock().insert(id.to_string());
    }

    pub fn fail_create_for(&self, id: &str) {
        self.failing_creates.lock().insert(id.to_string());
    }

    pub fn heal(&self) {
        self.failing_exists.lock().clear();
        self.failing_creates.lock().clear();
    }
}

fn store_error(call: &str, collection: &str, id: &str) -> SyncError {
    SyncError::Store(format!("{} {}/{} returned 500", call, collection, id))
}

#[async_trait]
impl DocumentStore for ObservedStore {
    async fn exists(&self, collection: &str, id: &str) -> SyncResult<bool> {
        if self.failing_exists.lock().contains(id) {
            return Err(store_error("HEAD", collection, id));
        }
        if self.blind_exists {
            return Ok(false);
        }
        self.inner.exists(collection, id).await
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> SyncResult<WriteOutcome> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.failing_creates.lock().contains(id) {
            return Err(store_error("PUT", collection, id));
        }
        self.inner.create_if_absent(collection, id, document).await
    }

    async fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, document: &Value) -> SyncResult<()> {
        self.inner.update(collection, id, document).await
    }
}
