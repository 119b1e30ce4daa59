//! # ParkPulse Importer
//!
//! Backfills the warehouse from the public archive of per-day event
//! files. Imports are resumable: a checkpoint row records the last
//! processed date and file, and a restarted import continues from the
//! next day. Pause, resume, and cancel are legal state transitions on
//! the checkpoint.

pub mod checkpoint;
pub mod importer;

pub use checkpoint::{ImportCheckpoint, ImportStatus};
pub use importer::{ArchiveImporter, ImportResult};
