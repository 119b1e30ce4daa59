//! # ParkPulse Config
//!
//! Configuration management for the ParkPulse warehouse.
//!
//! This crate provides:
//! - Environment variable loading via `dotenvy`
//! - Typed settings for the server, database, collector, and importer
//! - Secret handling for the database URL via `secrecy`

pub mod settings;

pub use settings::{
    CollectorSettings, DatabaseSettings, ImportSettings, ServerSettings, Settings,
};
