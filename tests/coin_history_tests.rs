mod common;

use serde_json::json;
use std::sync::Arc;

use common::{date, FlakyPrices, ObservedStore};
use hotspot_sync::error::SyncError;
use hotspot_sync::jobs::coin_history_sync::CoinHistorySync;
use hotspot_sync::services::document_store::DocumentStore;
use hotspot_sync::services::memory_store::{InMemoryDocumentStore, InMemoryWatermarkStore};
use hotspot_sync::services::watermark_store::{CoverageStore, DocumentWatermarkStore};

const COIN: &str = "helium";
const COLLECTION: &str = "coin-helium";

struct Harness {
    prices: Arc<FlakyPrices>,
    documents: Arc<InMemoryDocumentStore>,
    coverage: Arc<InMemoryWatermarkStore>,
    sync: CoinHistorySync,
}

fn harness() -> Harness {
    let prices = Arc::new(FlakyPrices::new());
    let documents = Arc::new(InMemoryDocumentStore::new());
    let coverage = Arc::new(InMemoryWatermarkStore::new());
    let sync = CoinHistorySync::new(prices.clone(), documents.clone(), coverage.clone());

    Harness {
        prices,
        documents,
        coverage,
        sync,
    }
}

#[tokio::test]
async fn test_backward_fill_from_seed() {
    let h = harness();

    let report = h
        .sync
        .fill(COIN, date(2021, 6, 28), date(2021, 7, 1))
        .await
        .unwrap();

    assert_eq!(report.written, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.coverage.earliest_date, date(2021, 6, 28));
    assert_eq!(report.coverage.latest_date, date(2021, 7, 1));
    assert_eq!(
        h.prices.calls(),
        vec![date(2021, 6, 30), date(2021, 6, 29), date(2021, 6, 28)]
    );

    let day = h.documents.get(COLLECTION, "28-06-2021").await.unwrap().unwrap();
    assert_eq!(day["time"], json!("2021-06-28T00:00:00Z"));
    assert_eq!(day["id"], json!("helium"));

    let stored = h
        .coverage
        .get_or_create_coverage(COIN, date(2030, 1, 1))
        .await
        .unwrap();
    assert_eq!(stored, report.coverage);
}

#[tokio::test]
async fn test_forward_fill_extends_latest() {
    let h = harness();
    h.sync
        .fill(COIN, date(2021, 6, 28), date(2021, 7, 1))
        .await
        .unwrap();

    let report = h
        .sync
        .fill(COIN, date(2021, 6, 28), date(2021, 7, 3))
        .await
        .unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(report.coverage.earliest_date, date(2021, 6, 28));
    assert_eq!(report.coverage.latest_date, date(2021, 7, 3));
    assert_eq!(&h.prices.calls()[3..], &[date(2021, 7, 1), date(2021, 7, 2)]);
    assert_eq!(h.documents.len(COLLECTION), 5);
}

#[tokio::test]
async fn test_covered_range_makes_no_requests() {
    let h = harness();
    h.sync
        .fill(COIN, date(2021, 6, 28), date(2021, 7, 1))
        .await
        .unwrap();
    let calls = h.prices.calls().len();

    let report = h
        .sync
        .fill(COIN, date(2021, 6, 29), date(2021, 6, 30))
        .await
        .unwrap();

    assert_eq!(report.written + report.existing + report.failed, 0);
    assert_eq!(h.prices.calls().len(), calls);
    assert_eq!(h.documents.len(COLLECTION), 3);
}

#[tokio::test]
async fn test_failed_day_stops_backward_coverage() {
    let h = harness();
    h.prices.fail_on(date(2021, 6, 29));

    let report = h
        .sync
        .fill(COIN, date(2021, 6, 27), date(2021, 7, 1))
        .await
        .unwrap();

    // Days past the gap are still stored
    assert_eq!(report.written, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.coverage.earliest_date, date(2021, 6, 30));
    assert!(h.documents.get(COLLECTION, "27-06-2021").await.unwrap().is_some());

    h.prices.heal();
    let calls = h.prices.calls().len();

    let report = h
        .sync
        .fill(COIN, date(2021, 6, 27), date(2021, 7, 1))
        .await
        .unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(report.existing, 2);
    assert_eq!(report.coverage.earliest_date, date(2021, 6, 27));
    assert_eq!(&h.prices.calls()[calls..], &[date(2021, 6, 29)]);
}

#[tokio::test]
async fn test_failed_day_stops_forward_coverage() {
    let h = harness();
    h.sync
        .fill(COIN, date(2021, 7, 1), date(2021, 7, 1))
        .await
        .unwrap();
    h.prices.fail_on(date(2021, 7, 2));

    let report = h
        .sync
        .fill(COIN, date(2021, 7, 1), date(2021, 7, 4))
        .await
        .unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.coverage.latest_date, date(2021, 7, 2));
    assert!(h.documents.get(COLLECTION, "03-07-2021").await.unwrap().is_some());
}

#[tokio::test]
async fn test_stored_days_are_not_refetched() {
    let h = harness();
    h.documents
        .create_if_absent(COLLECTION, "30-06-2021", &json!({"marker": "kept"}))
        .await
        .unwrap();

    let report = h
        .sync
        .fill(COIN, date(2021, 6, 29), date(2021, 7, 1))
        .await
        .unwrap();

    assert_eq!(report.existing, 1);
    assert_eq!(report.written, 1);
    assert_eq!(report.coverage.earliest_date, date(2021, 6, 29));
    assert_eq!(h.prices.calls(), vec![date(2021, 6, 29)]);

    let kept = h.documents.get(COLLECTION, "30-06-2021").await.unwrap().unwrap();
    assert_eq!(kept, json!({"marker": "kept"}));
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let h = harness();

    let result = h.sync.fill(COIN, date(2021, 7, 2), date(2021, 7, 1)).await;

    assert!(matches!(result, Err(SyncError::Config(_))));
    assert!(h.prices.calls().is_empty());
}

#[tokio::test]
async fn test_coverage_in_document_store_survives_restart() {
    let prices = Arc::new(FlakyPrices::new());
    let documents = Arc::new(InMemoryDocumentStore::new());
    let coverage = Arc::new(DocumentWatermarkStore::new(documents.clone()));

    CoinHistorySync::new(prices.clone(), documents.clone(), coverage.clone())
        .fill(COIN, date(2021, 6, 29), date(2021, 7, 1))
        .await
        .unwrap();

    let restarted = CoinHistorySync::new(
        prices.clone(),
        documents.clone(),
        Arc::new(DocumentWatermarkStore::new(documents.clone())),
    );
    let report = restarted
        .fill(COIN, date(2021, 6, 29), date(2021, 7, 1))
        .await
        .unwrap();

    assert_eq!(report.written + report.existing, 0);
    assert_eq!(prices.calls().len(), 2);
    assert_eq!(documents.len(DocumentWatermarkStore::COIN_COLLECTION), 1);
}

#[tokio::test]
async fn test_existence_check_error_fails_the_day() {
    let prices = Arc::new(FlakyPrices::new());
    let inner = Arc::new(InMemoryDocumentStore::new());
    let documents = Arc::new(ObservedStore::new(inner.clone()));
    let coverage = Arc::new(InMemoryWatermarkStore::new());
    documents.fail_exists_for("29-06-2021");

    let sync = CoinHistorySync::new(prices.clone(), documents.clone(), coverage.clone());
    let report = sync
        .fill(COIN, date(2021, 6, 27), date(2021, 7, 1))
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.written, 3);
    assert_eq!(report.coverage.earliest_date, date(2021, 6, 30));
    // The broken day is never fetched
    assert!(!prices.calls().contains(&date(2021, 6, 29)));
    assert!(inner.get(COLLECTION, "29-06-2021").await.unwrap().is_none());

    documents.heal();
    let report = sync
        .fill(COIN, date(2021, 6, 27), date(2021, 7, 1))
        .await
        .unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(report.existing, 2);
    assert_eq!(report.coverage.earliest_date, date(2021, 6, 27));
}
