pub use super::hotspot_watermarks::Entity as HotspotWatermarks;
