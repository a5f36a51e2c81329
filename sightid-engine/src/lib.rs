//! sightid-engine library interface
//!
//! Sighting identification: photo descriptors, identity resolution against
//! the catalog, and the transactional ingest of each sighting.

pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod models;
pub mod services;
pub mod utils;
pub mod vision;

pub use crate::config::{ConsistencyMode, EngineConfig};
pub use crate::error::{SubmissionError, SubmissionResult};
pub use crate::models::{SightingSubmission, SubmissionOutcome};
pub use crate::services::SubmissionService;
