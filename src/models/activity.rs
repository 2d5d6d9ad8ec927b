use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of hotspot activity as returned by the upstream API.
///
/// Records are kept as raw JSON; only `hash` and `time` are interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl ActivityPage {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
