//! Idempotent persistence of hotspot activity records.
//!
//! Records are keyed by their upstream `hash`. The existence check is only a
//! shortcut; `create_if_absent` is what keeps a record from being stored twice.
//! The persister never touches the watermark.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::SyncResult;
use crate::models::AntennaSchedule;
use crate::services::activity_drainer::PageSink;
use crate::services::document_store::{DocumentStore, WriteOutcome};
use crate::services::time_utils::{epoch_millis_to_utc, to_utc_string};

const ID_FIELD: &str = "hash";
const TIME_FIELD: &str = "time";
const ANTENNA_FIELD: &str = "antenna_config";

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Written,
    /// Already stored, detected either by the existence check or by the
    /// create conflict
    SkippedExisting,
    /// Missing `hash` or a usable `time`
    SkippedMalformed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistSummary {
    pub written: usize,
    pub skipped_existing: usize,
    pub malformed: usize,
}

impl PersistSummary {
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Written => self.written += 1,
            RecordOutcome::SkippedExisting => self.skipped_existing += 1,
            RecordOutcome::SkippedMalformed => self.malformed += 1,
        }
    }

    pub fn merge(&mut self, other: PersistSummary) {
        self.written += other.written;
        self.skipped_existing += other.skipped_existing;
        self.malformed += other.malformed;
    }

    pub fn total(&self) -> usize {
        self.written + self.skipped_existing + self.malformed
    }
}

#[derive(Clone)]
pub struct ActivityPersister {
    documents: Arc<dyn DocumentStore>,
}

impl ActivityPersister {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Persist `records` into `collection` in the order given.
    ///
    /// Stops at the first document-store error; records before it stay written.
    pub async fn persist(
        &self,
        address: &str,
        collection: &str,
        records: Vec<Value>,
        antennas: Option<&AntennaSchedule>,
    ) -> SyncResult<PersistSummary> {
        let mut summary = PersistSummary::default();

        for record in records {
            let outcome = self
                .persist_record(address, collection, record, antennas)
                .await?;
            summary.record(outcome);
        }

        tracing::debug!(
            address = %address,
            collection = %collection,
            written = summary.written,
            skipped_existing = summary.skipped_existing,
            malformed = summary.malformed,
            "Persisted activity page"
        );

        Ok(summary)
    }

    pub async fn persist_record(
        &self,
        address: &str,
        collection: &str,
        mut record: Value,
        antennas: Option<&AntennaSchedule>,
    ) -> SyncResult<RecordOutcome> {
        let Some((hash, occurred_at)) = record_key(&record) else {
            tracing::warn!(
                address = %address,
                record = %record,
                "Dropping activity record without hash or time"
            );
            return Ok(RecordOutcome::SkippedMalformed);
        };

        if self.documents.exists(collection, &hash).await? {
            return Ok(RecordOutcome::SkippedExisting);
        }

        if let Some(fields) = record.as_object_mut() {
            fields.insert(
                TIME_FIELD.to_string(),
                Value::String(to_utc_string(occurred_at)),
            );

            if let Some(antenna) = antennas.and_then(|schedule| schedule.lookup(occurred_at)) {
                fields.insert(ANTENNA_FIELD.to_string(), antenna.to_value());
            }
        }

        match self
            .documents
            .create_if_absent(collection, &hash, &record)
            .await?
        {
            WriteOutcome::Created => Ok(RecordOutcome::Written),
            WriteOutcome::AlreadyExists => Ok(RecordOutcome::SkippedExisting),
        }
    }
}

/// Idempotency key and occurrence time of an upstream record.
fn record_key(record: &Value) -> Option<(String, chrono::DateTime<chrono::Utc>)> {
    let hash = record.get(ID_FIELD)?.as_str()?;
    if hash.is_empty() {
        return None;
    }

    let time = record.get(TIME_FIELD)?;
    let millis = time
        .as_i64()
        .or_else(|| time.as_f64().map(|ms| ms as i64))?;

    Some((hash.to_string(), epoch_millis_to_utc(millis)?))
}

/// Page sink persisting every drained page of one hotspot window.
pub struct PersistingSink<'a> {
    persister: &'a ActivityPersister,
    address: &'a str,
    collection: &'a str,
    antennas: Option<&'a AntennaSchedule>,
    summary: PersistSummary,
}

impl<'a> PersistingSink<'a> {
    pub fn new(
        persister: &'a ActivityPersister,
        address: &'a str,
        collection: &'a str,
        antennas: Option<&'a AntennaSchedule>,
    ) -> Self {
        Self {
            persister,
            address,
            collection,
            antennas,
            summary: PersistSummary::default(),
        }
    }

    pub fn summary(&self) -> PersistSummary {
        self.summary
    }
}

#[async_trait]
impl PageSink for PersistingSink<'_> {
    async fn handle_page(&mut self, records: Vec<Value>) -> SyncResult<()> {
        let summary = self
            .persister
            .persist(self.address, self.collection, records, self.antennas)
            .await?;
        self.summary.merge(summary);
        Ok(())
    }
}
