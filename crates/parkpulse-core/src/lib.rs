//! # ParkPulse Core
//!
//! Shared types, traits, and utilities for the ParkPulse warehouse.
//!
//! This crate provides:
//! - Common types used across all crates (`Park`, `Ride`, snapshot rows)
//! - Status, category, period, and filter enums with database string mapping
//! - Error types for API boundaries using `thiserror`
//! - The shame-score and tier-weight math shared by the collector,
//!   aggregator, and query layer
//! - In-memory query caches
//! - Result type aliases using `anyhow` for internal operations

pub mod cache;
pub mod error;
pub mod metrics;
pub mod quality;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::AppCache;
pub use error::{ApiError, ErrorResponse};
pub use metrics::{
    is_down_for_park, round1, shame_score, tier_weight, DEFAULT_LIVE_WINDOW_HOURS,
    DEFAULT_SNAPSHOT_INTERVAL_MINUTES, DORMANT_RIDE_DAYS,
};
pub use types::{
    DataSource, ParkFilter, Period, RideCategory, RideStatus, UpstreamSnapshot,
};

/// Result type alias for internal operations using `anyhow`
pub type Result<T> = anyhow::Result<T>;
