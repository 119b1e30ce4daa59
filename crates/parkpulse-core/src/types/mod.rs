//! Shared type definitions.
//!
//! Database models and domain types used across the warehouse crates.

mod entities;
mod period;
mod status;

pub use entities::{
    Park, ParkActivitySnapshot, Ride, RideClassification, RideStatusSnapshot, UpstreamSnapshot,
};
pub use period::{ParkFilter, Period};
pub use status::{DataSource, RideCategory, RideStatus};
