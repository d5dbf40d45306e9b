use thiserror::Error;

/// Errors from the media staging area.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The temp-to-final rename failed; the caller must fail the job rather
    /// than leave it referencing a nonexistent path.
    #[error("staging commit failed for key {key}: {source}")]
    CommitFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored `storage_path` escapes the staging root or is malformed.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;
