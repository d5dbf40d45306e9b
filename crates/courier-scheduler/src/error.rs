use thiserror::Error;

/// Errors that can occur while scanning or executing scheduled jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] courier_store::StoreError),

    #[error("media error: {0}")]
    Media(#[from] courier_media::MediaError),

    /// The `scheduled_for` value cannot be parsed in any tolerated format.
    #[error("unparseable timestamp: {0}")]
    Timestamp(String),

    #[error("job not found: {id}")]
    JobNotFound { id: i64 },

    /// The job already reached a terminal status.
    #[error("job {id} already processed")]
    AlreadyProcessed { id: i64 },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
