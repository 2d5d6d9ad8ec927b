//! Hotspot activity sync
//!
//! For every configured hotspot: load (or seed) its watermark, then walk
//! day-sized windows from `processed_at` up to the run timestamp. Each window
//! is drained page by page into the document store, and only once the whole
//! window is persisted does the watermark move to the window's upper edge.
//! A failure stops the current hotspot only; the next run resumes from the
//! last completed window.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{AntennaSchedule, HotspotConfig, HotspotWatermark};
use crate::services::activity_drainer::drain_window;
use crate::services::activity_persister::{ActivityPersister, PersistSummary, PersistingSink};
use crate::services::document_store::DocumentStore;
use crate::services::helium_api::ActivitySource;
use crate::services::watermark_store::WatermarkStore;
use crate::services::window_planner::plan_window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotStatus {
    /// Watermark reached the run timestamp
    Synced,
    /// Activity count unchanged since the last completed sync
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct HotspotSyncReport {
    pub address: String,
    pub status: HotspotStatus,
    pub windows: usize,
    pub persisted: PersistSummary,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of one pass over all configured hotspots.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Earliest birth among hotspots whose watermark could be loaded,
    /// `run_at` when there were none
    pub earliest_born_at: DateTime<Utc>,
    pub synced: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub persisted: PersistSummary,
}

impl RunSummary {
    fn new(run_at: DateTime<Utc>) -> Self {
        Self {
            earliest_born_at: run_at,
            synced: 0,
            unchanged: 0,
            failed: 0,
            persisted: PersistSummary::default(),
        }
    }
}

pub struct HotspotActivitySync {
    source: Arc<dyn ActivitySource>,
    watermarks: Arc<dyn WatermarkStore>,
    persister: ActivityPersister,
    detect_changes: bool,
}

impl HotspotActivitySync {
    pub fn new(
        source: Arc<dyn ActivitySource>,
        watermarks: Arc<dyn WatermarkStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            source,
            watermarks,
            persister: ActivityPersister::new(documents),
            detect_changes: false,
        }
    }

    /// Skip hotspots whose upstream activity count has not moved.
    pub fn with_change_detection(mut self, enabled: bool) -> Self {
        self.detect_changes = enabled;
        self
    }

    /// Sync every hotspot in turn. Failures are logged and counted; they
    /// never stop the remaining hotspots.
    pub async fn process_hotspots(
        &self,
        hotspots: &[HotspotConfig],
        run_at: DateTime<Utc>,
    ) -> RunSummary {
        info!(run_at = %run_at, hotspots = hotspots.len(), "Starting hotspot activity sync");

        let mut summary = RunSummary::new(run_at);

        for hotspot in hotspots {
            let address = hotspot.hotspot_address.as_str();

            let watermark = match self.load_watermark(address).await {
                Ok(watermark) => watermark,
                Err(e) => {
                    error!(address = %address, error = %e, "Failed to load hotspot watermark, skipping");
                    summary.failed += 1;
                    continue;
                }
            };

            summary.earliest_born_at = summary.earliest_born_at.min(watermark.born_at);

            let schedule = hotspot.antenna_schedule();
            match self.sync_hotspot(watermark, &schedule, run_at).await {
                Ok(report) => {
                    match report.status {
                        HotspotStatus::Synced => summary.synced += 1,
                        HotspotStatus::Unchanged => summary.unchanged += 1,
                    }
                    summary.persisted.merge(report.persisted);
                }
                Err(e) => {
                    error!(address = %address, error = %e, "Hotspot sync aborted");
                    summary.failed += 1;
                }
            }
        }

        info!(
            synced = summary.synced,
            unchanged = summary.unchanged,
            failed = summary.failed,
            written = summary.persisted.written,
            skipped_existing = summary.persisted.skipped_existing,
            earliest_born_at = %summary.earliest_born_at,
            "Hotspot activity sync complete"
        );

        summary
    }

    /// Stored watermark, or a new one seeded from upstream metadata.
    pub async fn load_watermark(&self, address: &str) -> SyncResult<HotspotWatermark> {
        if let Some(watermark) = self.watermarks.get(address).await? {
            return Ok(watermark);
        }

        info!(address = %address, "No watermark yet, fetching hotspot metadata");

        let metadata = self
            .source
            .get_metadata(address)
            .await?
            .ok_or_else(|| SyncError::HotspotNotFound(address.to_string()))?;

        self.watermarks
            .create(&HotspotWatermark::seeded(address, &metadata))
            .await
    }

    /// Walk windows from the watermark up to `run_at`, advancing the
    /// watermark after each fully drained window.
    pub async fn sync_hotspot(
        &self,
        mut watermark: HotspotWatermark,
        antennas: &AntennaSchedule,
        run_at: DateTime<Utc>,
    ) -> SyncResult<HotspotSyncReport> {
        let address = watermark.address.clone();
        let collection = watermark.collection().to_string();
        let antennas = (!antennas.is_empty()).then_some(antennas);

        let mut report = HotspotSyncReport {
            address: address.clone(),
            status: HotspotStatus::Synced,
            windows: 0,
            persisted: PersistSummary::default(),
            processed_at: watermark.processed_at,
        };

        let mut latest_count = None;
        if self.detect_changes {
            let count = self.source.get_activity_count(&address).await?;
            if count == watermark.activity_count {
                info!(address = %address, activity_count = count, "No new activity, skipping");
                report.status = HotspotStatus::Unchanged;
                return Ok(report);
            }
            info!(
                address = %address,
                old_count = watermark.activity_count,
                new_count = count,
                "Activity count changed"
            );
            latest_count = Some(count);
        }

        if watermark.processed_at >= run_at {
            warn!(
                address = %address,
                processed_at = %watermark.processed_at,
                run_at = %run_at,
                "Watermark already at or past run timestamp"
            );
        } else {
            loop {
                let window = plan_window(watermark.processed_at, watermark.born_at, run_at);

                info!(name = %collection, address = %address, window = %window, "Processing activity window");

                let mut sink = PersistingSink::new(&self.persister, &address, &collection, antennas);
                if let Err(e) = drain_window(self.source.as_ref(), &address, &window, &mut sink).await {
                    error!(
                        address = %address,
                        min_date = %window.min_date,
                        max_date = %window.max_date,
                        error = %e,
                        "Activity window failed, watermark left at {}",
                        watermark.processed_at
                    );
                    return Err(e);
                }

                report.persisted.merge(sink.summary());
                report.windows += 1;

                // The whole window is persisted; only now may the watermark move
                watermark.processed_at = watermark.processed_at.max(window.max_date);
                if window.is_final {
                    if let Some(count) = latest_count {
                        watermark.activity_count = count;
                    }
                }
                self.watermarks.update(&watermark).await?;

                if window.is_final {
                    break;
                }
            }
        }

        report.processed_at = watermark.processed_at;

        info!(
            address = %address,
            windows = report.windows,
            written = report.persisted.written,
            processed_at = %report.processed_at,
            "Hotspot synced"
        );

        Ok(report)
    }
}
