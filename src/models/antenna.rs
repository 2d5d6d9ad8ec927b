use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::services::time_utils::parse_utc;

/// Antenna/hardware setup of a hotspot, effective from `date` onwards.
///
/// All other fields are opaque and copied onto enriched records as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct AntennaConfig {
    pub effective_from: DateTime<Utc>,
    fields: Map<String, Value>,
}

impl AntennaConfig {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl TryFrom<Map<String, Value>> for AntennaConfig {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let raw = fields
            .get("date")
            .and_then(Value::as_str)
            .ok_or_else(|| "antenna entry is missing a 'date' string".to_string())?;

        let effective_from =
            parse_utc(raw).ok_or_else(|| format!("unparseable antenna date '{}'", raw))?;

        Ok(Self {
            effective_from,
            fields,
        })
    }
}

impl From<AntennaConfig> for Map<String, Value> {
    fn from(config: AntennaConfig) -> Self {
        config.fields
    }
}

/// Antenna history of one hotspot, latest entry first.
#[derive(Debug, Clone, Default)]
pub struct AntennaSchedule {
    entries: Vec<AntennaConfig>,
}

impl AntennaSchedule {
    pub fn new(mut entries: Vec<AntennaConfig>) -> Self {
        entries.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configuration in effect at `at`: the latest entry not after it.
    pub fn lookup(&self, at: DateTime<Utc>) -> Option<&AntennaConfig> {
        self.entries.iter().find(|entry| entry.effective_from <= at)
    }
}
