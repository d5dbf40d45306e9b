use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A JSON column (recipients, media_refs) failed to encode or decode.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No job with the given id exists.
    #[error("job not found: {id}")]
    JobNotFound { id: i64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;
