use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::antenna::{AntennaConfig, AntennaSchedule};

/// A tracked hotspot as listed in the hotspot config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotConfig {
    pub hotspot_address: String,
    #[serde(default)]
    pub antennas: Vec<AntennaConfig>,
}

impl HotspotConfig {
    pub fn antenna_schedule(&self) -> AntennaSchedule {
        AntennaSchedule::new(self.antennas.clone())
    }
}

/// Upstream metadata needed to seed a new watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotspotMetadata {
    pub name: String,
    pub added_at: DateTime<Utc>,
}

/// Sync progress of a single hotspot.
///
/// `born_at <= processed_at` always holds; `processed_at` only moves forward
/// and only after a whole window has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotWatermark {
    pub address: String,
    pub name: String,
    pub born_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub activity_count: i64,
}

impl HotspotWatermark {
    /// Fresh watermark seeded from upstream metadata.
    ///
    /// The activity count starts at zero so change detection never mistakes
    /// a new hotspot for an up-to-date one.
    pub fn seeded(address: &str, metadata: &HotspotMetadata) -> Self {
        Self {
            address: address.to_string(),
            name: metadata.name.clone(),
            born_at: metadata.added_at,
            processed_at: metadata.added_at,
            activity_count: 0,
        }
    }

    /// Document index holding this hotspot's activity.
    pub fn collection(&self) -> &str {
        &self.name
    }
}
