use thiserror::Error;

/// Errors surfaced by the client subsystem.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The account has no live authenticated connection.
    #[error("account not connected: {account}")]
    NotConnected { account: String },

    /// `verify` was called without a preceding `login` for this account.
    #[error("no pending verification for account: {account}")]
    NoPendingVerification { account: String },

    /// Rejected before any remote challenge was issued.
    #[error("invalid phone number format: {0}")]
    InvalidPhone(String),

    #[error("invalid verification code")]
    InvalidCode,

    #[error("invalid password")]
    InvalidPassword,

    /// The identifier matched no peer through any resolution strategy.
    #[error("could not resolve recipient: {identifier}")]
    ResolutionFailed { identifier: String },

    /// Remote platform call failed, including rate-limit responses.
    #[error("transport error: {0}")]
    Transport(String),

    /// A call marshaled onto the client actor did not complete in time.
    #[error("client call timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The actor task is gone — only happens during shutdown.
    #[error("client actor closed")]
    ActorClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
