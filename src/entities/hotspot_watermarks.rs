//! `SeaORM` Entity for hotspot_watermarks table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "hotspot_watermarks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub address: String,
    /// Display name, doubles as the document index for the hotspot's activity
    pub name: String,
    pub born_at: DateTimeUtc,
    /// Upper edge of activity already fetched and persisted
    pub processed_at: DateTimeUtc,
    pub activity_count: i64,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
