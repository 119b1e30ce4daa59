//! # ParkPulse Collector
//!
//! The collection pipeline: every cycle it fetches current state for all
//! tracked parks, resolves upstream entities to internal ids, derives
//! per-ride and per-park metrics, and persists snapshots. One park is one
//! transaction; every row in a cycle shares the same `recorded_at`.

pub mod bootstrap;
pub mod cycle;
pub mod metadata;
pub mod resolver;
pub mod writer;

pub use bootstrap::{sync_parks, BootstrapOutcome};
pub use cycle::CollectionCycle;
pub use metadata::{sync_metadata, MetadataOutcome};
pub use resolver::{EntityResolver, MappingResult, MatchType};
pub use writer::{write_park_cycle, ParkCycleSummary, ResolvedRide};
