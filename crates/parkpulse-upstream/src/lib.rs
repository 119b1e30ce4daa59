//! # ParkPulse Upstream
//!
//! Adapters for the two upstream data sources and the historical archive.
//!
//! Both sources normalize into [`parkpulse_core::UpstreamSnapshot`]; no
//! other crate may depend on vendor field names. The archive reader turns
//! gzip-compressed daily event files into the same shape.

pub mod archive;
pub mod error;
pub mod queue_times;
pub mod retry;
pub mod wiki_parks;

pub use archive::{parse_archive_content, ArchiveEvent};
pub use error::UpstreamError;
pub use queue_times::{QueueTimesClient, UpstreamPark};
pub use wiki_parks::{ArchiveObject, WikiParksClient};
