use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;

use crate::entities::{coin_coverage, hotspot_watermarks, prelude::HotspotWatermarks};
use crate::error::{SyncError, SyncResult};
use crate::models::{CoinCoverage, HotspotWatermark};
use crate::services::document_store::DocumentStore;

/// Persisted per-hotspot sync progress.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self, address: &str) -> SyncResult<Option<HotspotWatermark>>;

    /// Store `watermark` unless one already exists; returns whichever is stored.
    async fn create(&self, watermark: &HotspotWatermark) -> SyncResult<HotspotWatermark>;

    /// Persist `processed_at` and `activity_count`. `born_at` never changes.
    async fn update(&self, watermark: &HotspotWatermark) -> SyncResult<()>;
}

/// Persisted per-coin history coverage.
#[async_trait]
pub trait CoverageStore: Send + Sync {
    /// Fetch coverage, seeding an empty range at `seed` on first use.
    async fn get_or_create_coverage(&self, coin_id: &str, seed: NaiveDate)
    -> SyncResult<CoinCoverage>;

    async fn update_coverage(&self, coverage: &CoinCoverage) -> SyncResult<()>;
}

impl From<hotspot_watermarks::Model> for HotspotWatermark {
    fn from(model: hotspot_watermarks::Model) -> Self {
        Self {
            address: model.address,
            name: model.name,
            born_at: model.born_at,
            processed_at: model.processed_at,
            activity_count: model.activity_count,
        }
    }
}

impl From<coin_coverage::Model> for CoinCoverage {
    fn from(model: coin_coverage::Model) -> Self {
        Self {
            coin_id: model.coin_id,
            earliest_date: model.earliest_date,
            latest_date: model.latest_date,
        }
    }
}

/// Watermarks kept in Postgres (`hotspot_watermarks`, `coin_coverage`).
#[derive(Clone)]
pub struct PgWatermarkStore {
    db: DatabaseConnection,
}

impl PgWatermarkStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    async fn get(&self, address: &str) -> SyncResult<Option<HotspotWatermark>> {
        let row = HotspotWatermarks::find_by_id(address.to_string())
            .one(&self.db)
            .await?;

        Ok(row.map(HotspotWatermark::from))
    }

    async fn create(&self, watermark: &HotspotWatermark) -> SyncResult<HotspotWatermark> {
        let model = hotspot_watermarks::ActiveModel {
            address: Set(watermark.address.clone()),
            name: Set(watermark.name.clone()),
            born_at: Set(watermark.born_at),
            processed_at: Set(watermark.processed_at),
            activity_count: Set(watermark.activity_count),
            updated_at: Set(Some(Utc::now())),
        };

        // A concurrent run may have created the row first; keep theirs
        let inserted = HotspotWatermarks::insert(model)
            .on_conflict(
                OnConflict::column(hotspot_watermarks::Column::Address)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        if inserted > 0 {
            tracing::info!(address = %watermark.address, name = %watermark.name, "Created hotspot watermark");
        }

        self.get(&watermark.address).await?.ok_or_else(|| {
            SyncError::Store(format!("watermark for {} vanished after insert", watermark.address))
        })
    }

    async fn update(&self, watermark: &HotspotWatermark) -> SyncResult<()> {
        // Guarded so an overlapping older run can never move processed_at back
        let result = HotspotWatermarks::update_many()
            .col_expr(
                hotspot_watermarks::Column::ProcessedAt,
                Expr::value(watermark.processed_at),
            )
            .col_expr(
                hotspot_watermarks::Column::ActivityCount,
                Expr::value(watermark.activity_count),
            )
            .col_expr(hotspot_watermarks::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(hotspot_watermarks::Column::Address.eq(watermark.address.as_str()))
            .filter(hotspot_watermarks::Column::ProcessedAt.lte(watermark.processed_at))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            tracing::warn!(
                address = %watermark.address,
                processed_at = %watermark.processed_at,
                "Watermark not updated, stored value is newer or missing"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl CoverageStore for PgWatermarkStore {
    async fn get_or_create_coverage(
        &self,
        coin_id: &str,
        seed: NaiveDate,
    ) -> SyncResult<CoinCoverage> {
        let model = coin_coverage::ActiveModel {
            coin_id: Set(coin_id.to_string()),
            earliest_date: Set(seed),
            latest_date: Set(seed),
            updated_at: Set(Some(Utc::now())),
        };

        coin_coverage::Entity::insert(model)
            .on_conflict(
                OnConflict::column(coin_coverage::Column::CoinId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let row = coin_coverage::Entity::find_by_id(coin_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| SyncError::Store(format!("coverage for {} vanished after insert", coin_id)))?;

        Ok(row.into())
    }

    async fn update_coverage(&self, coverage: &CoinCoverage) -> SyncResult<()> {
        let model = coin_coverage::ActiveModel {
            coin_id: Set(coverage.coin_id.clone()),
            earliest_date: Set(coverage.earliest_date),
            latest_date: Set(coverage.latest_date),
            updated_at: Set(Some(Utc::now())),
        };

        model.update(&self.db).await?;
        Ok(())
    }
}

/// Watermarks kept as JSON documents next to the activity data,
/// one collection for hotspots and one for coins.
#[derive(Clone)]
pub struct DocumentWatermarkStore {
    documents: Arc<dyn DocumentStore>,
    hotspot_collection: String,
    coin_collection: String,
}

impl DocumentWatermarkStore {
    pub const HOTSPOT_COLLECTION: &'static str = "helium-config";
    pub const COIN_COLLECTION: &'static str = "coin-config";

    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            hotspot_collection: Self::HOTSPOT_COLLECTION.to_string(),
            coin_collection: Self::COIN_COLLECTION.to_string(),
        }
    }
}

#[async_trait]
impl WatermarkStore for DocumentWatermarkStore {
    async fn get(&self, address: &str) -> SyncResult<Option<HotspotWatermark>> {
        match self.documents.get(&self.hotspot_collection, address).await? {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, watermark: &HotspotWatermark) -> SyncResult<HotspotWatermark> {
        let document = serde_json::to_value(watermark)?;
        self.documents
            .create_if_absent(&self.hotspot_collection, &watermark.address, &document)
            .await?;

        // Document stores may lag right after a write; fall back to what we wrote
        Ok(self
            .get(&watermark.address)
            .await?
            .unwrap_or_else(|| watermark.clone()))
    }

    async fn update(&self, watermark: &HotspotWatermark) -> SyncResult<()> {
        if let Some(stored) = self.get(&watermark.address).await? {
            if stored.processed_at > watermark.processed_at {
                tracing::warn!(
                    address = %watermark.address,
                    stored = %stored.processed_at,
                    proposed = %watermark.processed_at,
                    "Watermark not updated, stored value is newer"
                );
                return Ok(());
            }
        }

        let document = serde_json::to_value(watermark)?;
        self.documents
            .update(&self.hotspot_collection, &watermark.address, &document)
            .await
    }
}

#[async_trait]
impl CoverageStore for DocumentWatermarkStore {
    async fn get_or_create_coverage(
        &self,
        coin_id: &str,
        seed: NaiveDate,
    ) -> SyncResult<CoinCoverage> {
        if let Some(document) = self.documents.get(&self.coin_collection, coin_id).await? {
            return Ok(serde_json::from_value(document)?);
        }

        let coverage = CoinCoverage::empty_at(coin_id, seed);
        self.documents
            .create_if_absent(&self.coin_collection, coin_id, &serde_json::to_value(&coverage)?)
            .await?;

        Ok(coverage)
    }

    async fn update_coverage(&self, coverage: &CoinCoverage) -> SyncResult<()> {
        let document = serde_json::to_value(coverage)?;
        self.documents
            .update(&self.coin_collection, &coverage.coin_id, &document)
            .await
    }
}
