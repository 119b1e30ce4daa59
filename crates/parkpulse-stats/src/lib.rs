//! # ParkPulse Stats
//!
//! The multi-resolution aggregation engine: hourly stats from raw
//! snapshots, daily stats per park-local calendar day, weekly stats from
//! daily rows keyed by ISO week. Every level is an idempotent UPSERT keyed
//! by (entity, period), and every run is bracketed by an
//! `aggregation_log` row — the authoritative barrier for any later
//! cleanup of raw snapshots.

pub mod bounds;
pub mod daily;
pub mod engine;
pub mod hourly;
pub mod log;
pub mod raw_window;
pub mod sql;
pub mod storage;
pub mod types;
pub mod weekly;

pub use bounds::{
    iso_week_of, local_day_bounds_utc, pacific_day_bounds_utc, pacific_now, pacific_today, PACIFIC,
};
pub use engine::{AggregationOutcome, Aggregator};
pub use log::{AggregationLogEntry, RunDecision};
pub use raw_window::{park_window_stats, ParkWindowStats};
pub use types::{
    ParkDailyRow, ParkHourlyRow, ParkWeeklyRow, RideDailyRow, RideHourlyRow, RideWeeklyRow,
};
