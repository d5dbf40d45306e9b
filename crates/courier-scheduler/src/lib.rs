//! `courier-scheduler` — the background loop that turns due pending jobs
//! into dispatches.
//!
//! A single perpetual task polls the store every 30 seconds, normalizes each
//! pending job's `scheduled_for` into a comparable UTC instant (including
//! best-effort recovery of timezone-less timestamps), and executes due jobs
//! through the dispatch engine. Per-job failures never stop the scan; a
//! scan-level failure backs the loop off to 60 seconds instead of crashing it.

pub mod engine;
pub mod error;
pub mod execute;
pub mod normalize;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use execute::JobExecutor;
pub use normalize::normalize_scheduled_for;
