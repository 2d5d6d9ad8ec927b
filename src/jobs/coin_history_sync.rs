//! Coin history backfill
//!
//! Keeps one document per calendar day of a coin's price history in the
//! `coin-{coin}` collection and tracks the stored extent as a half-open day
//! range. Missing days before the range are filled walking backwards, missing
//! days after it walking forwards. The range only grows across days that are
//! actually stored, so a failed day stays outside coverage and is retried by
//! the next run.

use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::CoinCoverage;
use crate::services::coingecko::PriceHistorySource;
use crate::services::document_store::{DocumentStore, WriteOutcome};
use crate::services::time_utils::{coin_day_id, midnight_utc, to_utc_string};
use crate::services::watermark_store::CoverageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayOutcome {
    Written,
    Existing,
    Failed,
}

impl DayOutcome {
    fn is_stored(self) -> bool {
        self != DayOutcome::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillReport {
    pub written: usize,
    pub existing: usize,
    pub failed: usize,
    pub coverage: CoinCoverage,
}

pub struct CoinHistorySync {
    prices: Arc<dyn PriceHistorySource>,
    documents: Arc<dyn DocumentStore>,
    coverage: Arc<dyn CoverageStore>,
    request_delay: Duration,
}

impl CoinHistorySync {
    pub fn new(
        prices: Arc<dyn PriceHistorySource>,
        documents: Arc<dyn DocumentStore>,
        coverage: Arc<dyn CoverageStore>,
    ) -> Self {
        Self {
            prices,
            documents,
            coverage,
            request_delay: Duration::ZERO,
        }
    }

    /// Pause between upstream history calls (rate limiting).
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn collection(coin_id: &str) -> String {
        format!("coin-{}", coin_id)
    }

    /// Make sure every day in `[earliest_needed, latest_needed)` is stored.
    pub async fn fill(
        &self,
        coin_id: &str,
        earliest_needed: NaiveDate,
        latest_needed: NaiveDate,
    ) -> SyncResult<FillReport> {
        if earliest_needed > latest_needed {
            return Err(SyncError::Config(format!(
                "backfill range for {} is inverted: {} > {}",
                coin_id, earliest_needed, latest_needed
            )));
        }

        info!(
            coin = %coin_id,
            earliest_needed = %earliest_needed,
            latest_needed = %latest_needed,
            "Starting coin history backfill"
        );

        let stored = self
            .coverage
            .get_or_create_coverage(coin_id, latest_needed)
            .await?;

        let collection = Self::collection(coin_id);
        let mut report = FillReport {
            written: 0,
            existing: 0,
            failed: 0,
            coverage: stored.clone(),
        };

        if earliest_needed < report.coverage.earliest_date {
            let mut frontier = report.coverage.earliest_date;
            let mut contiguous = true;
            let mut day = report.coverage.earliest_date;

            while let Some(previous) = day.pred_opt() {
                if previous < earliest_needed {
                    break;
                }
                day = previous;

                let outcome = self.fill_day(coin_id, &collection, day, &mut report).await;
                if !outcome.is_stored() {
                    contiguous = false;
                } else if contiguous {
                    frontier = day;
                }
            }

            report.coverage.earliest_date = frontier;
        }

        if latest_needed > report.coverage.latest_date {
            let mut frontier = report.coverage.latest_date;
            let mut contiguous = true;
            let mut day = report.coverage.latest_date;

            while day < latest_needed {
                let outcome = self.fill_day(coin_id, &collection, day, &mut report).await;
                let Some(next) = day.succ_opt() else {
                    break;
                };

                if !outcome.is_stored() {
                    contiguous = false;
                } else if contiguous {
                    frontier = next;
                }
                day = next;
            }

            report.coverage.latest_date = frontier;
        }

        if report.coverage != stored {
            self.coverage.update_coverage(&report.coverage).await?;
            info!(
                coin = %coin_id,
                earliest_date = %report.coverage.earliest_date,
                latest_date = %report.coverage.latest_date,
                "Coin history coverage extended"
            );
        }

        if report.failed > 0 {
            warn!(
                coin = %coin_id,
                failed = report.failed,
                "Some days could not be fetched, they will be retried next run"
            );
        }

        info!(
            coin = %coin_id,
            written = report.written,
            existing = report.existing,
            failed = report.failed,
            "Coin history backfill complete"
        );

        Ok(report)
    }

    async fn fill_day(
        &self,
        coin_id: &str,
        collection: &str,
        day: NaiveDate,
        report: &mut FillReport,
    ) -> DayOutcome {
        let id = coin_day_id(day);

        let outcome = match self.documents.exists(collection, &id).await {
            Ok(true) => DayOutcome::Existing,
            Ok(false) => {
                let result = self.fetch_and_write_day(coin_id, collection, &id, day).await;

                if !self.request_delay.is_zero() {
                    tokio::time::sleep(self.request_delay).await;
                }

                match result {
                    Ok(WriteOutcome::Created) => DayOutcome::Written,
                    Ok(WriteOutcome::AlreadyExists) => DayOutcome::Existing,
                    Err(e) => {
                        warn!(coin = %coin_id, day = %id, error = %e, "Failed to backfill day");
                        DayOutcome::Failed
                    }
                }
            }
            Err(e) => {
                warn!(coin = %coin_id, day = %id, error = %e, "Existence check failed");
                DayOutcome::Failed
            }
        };

        debug!(coin = %coin_id, day = %id, outcome = ?outcome, "Backfilled day");

        match outcome {
            DayOutcome::Written => report.written += 1,
            DayOutcome::Existing => report.existing += 1,
            DayOutcome::Failed => report.failed += 1,
        }

        outcome
    }

    async fn fetch_and_write_day(
        &self,
        coin_id: &str,
        collection: &str,
        id: &str,
        day: NaiveDate,
    ) -> SyncResult<WriteOutcome> {
        let mut document = self.prices.get_coin_history(coin_id, day).await?;

        let Some(fields) = document.as_object_mut() else {
            return Err(SyncError::UnexpectedResponse(format!(
                "{} history for {} is not an object",
                coin_id, id
            )));
        };
        fields.insert(
            "time".to_string(),
            Value::String(to_utc_string(midnight_utc(day))),
        );

        self.documents.create_if_absent(collection, id, &document).await
    }
}
