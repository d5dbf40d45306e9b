//! `courier-core` — shared types, configuration, and the process-wide error
//! taxonomy for the Courier outbound-message service.

pub mod config;
pub mod error;
pub mod types;

pub use config::CourierConfig;
pub use error::{CourierError, Result};
pub use types::{
    Attachment, DispatchResult, DispatchSummary, JobStatus, MediaRef, Recipient, ScheduledJob,
};
