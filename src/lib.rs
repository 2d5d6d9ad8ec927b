// src/lib.rs

pub mod config;
pub mod error;

pub mod entities {
    pub mod prelude;
    pub mod coin_coverage;
    pub mod hotspot_watermarks;
}

pub mod services {
    pub mod activity_drainer;
    pub mod activity_persister;
    pub mod coingecko;
    pub mod document_store;
    pub mod helium_api;
    pub mod memory_store;
    pub mod opensearch;
    pub mod time_utils;
    pub mod watermark_store;
    pub mod window_planner;
}

pub mod models;
pub mod jobs;
