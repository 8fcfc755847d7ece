//! Error types for the faculty store

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A row that must exist is missing
    #[error("{entity} '{key}' not found")]
    NotFound {
        entity: &'static str,
        key: String,
    },

    /// Stored data violates an invariant
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Error::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;
