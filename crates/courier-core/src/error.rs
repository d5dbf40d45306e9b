use thiserror::Error;

/// Process-wide error taxonomy. Subsystem crates define their own error enums
/// and convert into this at the gateway boundary.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed input — rejected before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid code, invalid password, invalid phone format, not authenticated.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Store operation failed — propagated to the caller.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Remote platform call failed, including rate-limit responses.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unparseable `scheduled_for` value.
    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CourierError>;
