//! # ParkPulse Rankings
//!
//! The live rankings materializer. Every collection cycle it rebuilds the
//! denormalized `park_live_rankings` and `ride_live_rankings` tables in
//! staging twins, then publishes with an atomic three-way rename so
//! readers never see an empty or partial table.

pub mod materializer;

pub use materializer::{LiveRankingsMaterializer, MaterializeOutcome};
