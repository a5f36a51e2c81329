//! # sightid common library
//!
//! Shared code for the sighting identification workspace:
//! - Error taxonomy shared by every crate
//! - Configuration loading and root folder resolution
//! - SQLite database bootstrap (pool, pragmas, catalog schema)

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
