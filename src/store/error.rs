//! Document store error types

use thiserror::Error;

/// Errors that can occur in the document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation failed (creating the data directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Document body is not a settings object
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Reading rejected on ingest
    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
