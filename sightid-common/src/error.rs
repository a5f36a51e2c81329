//! Catalog-level errors shared by the sightid crates

use thiserror::Error;

/// Result alias over [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of configuration, catalog storage and record lookup
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite statement, transaction or pool failure
    #[error("Catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure while preparing the root folder or reading config
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or out-of-range configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog record (individual or sighting) absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invariant broken inside the engine, e.g. an unserializable descriptor
    #[error("Internal error: {0}")]
    Internal(String),
}
