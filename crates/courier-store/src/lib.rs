//! `courier-store` — SQLite persistence for scheduled jobs and account
//! session metadata.
//!
//! Two tables: `jobs` (one row per outbound-message job, §jobs schema in
//! `db.rs`) and `accounts` (platform credentials + last-active). A single
//! `Connection` is wrapped in a `Mutex`; the scheduler loop and request
//! handlers each open their own store over the same database file, so the
//! only concurrency control needed is WAL mode plus one-writer-at-a-time
//! per connection.

pub mod db;
pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{AccountRecord, JobStats, JobStore, NewJob};
