//! `courier-media` — on-disk staging for job attachments.
//!
//! Uploaded files are materialized under one directory per job id and
//! reclaimed after the job's terminal transition. When files arrive before
//! the job id exists, they stage under a generated temporary key and are
//! committed (directory rename + path rewrite) once the id is assigned.

pub mod error;
pub mod staging;

pub use error::{MediaError, Result};
pub use staging::{MediaStaging, Upload};
