//! Error types for the store crate.

use thiserror::Error;

/// Durability failures on append or read.
///
/// Any of these during an append aborts the whole command; no partial entry
/// is ever observable afterward.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Entry serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored data failed to parse back into a valid entry.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
