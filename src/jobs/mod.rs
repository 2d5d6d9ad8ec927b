pub mod coin_history_sync;
pub mod hotspot_activity_sync;
