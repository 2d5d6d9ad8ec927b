pub mod activity;
pub mod antenna;
pub mod coin;
pub mod hotspot;

pub use activity::ActivityPage;
pub use antenna::{AntennaConfig, AntennaSchedule};
pub use coin::CoinCoverage;
pub use hotspot::{HotspotConfig, HotspotMetadata, HotspotWatermark};
