//! Error types for the vector database

use thiserror::Error;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, AnnDbError>;

/// Error types that can occur in database operations
#[derive(Error, Debug)]
pub enum AnnDbError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Record not found: {id}")]
    RecordNotFound { id: u64 },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Index out of date: records changed since the last rebuild")]
    IndexOutOfDate,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
