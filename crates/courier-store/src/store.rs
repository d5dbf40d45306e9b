use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, instrument};

use courier_core::types::{JobStatus, MediaRef, Recipient, ScheduledJob};

use crate::db::init_db;
use crate::error::{Result, StoreError};

/// Fields supplied by the caller when creating a job; everything else is
/// store-assigned.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner: String,
    pub recipients: Vec<Recipient>,
    pub body: String,
    pub scheduled_for: String,
    pub media_refs: Vec<MediaRef>,
}

/// Per-owner job counts for the scheduler status surface.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

/// Persisted account-session metadata (credentials live here; the platform
/// session artifact lives on disk under the sessions dir).
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub account: String,
    pub api_id: String,
    pub api_hash: String,
    pub last_active: String,
}

/// Thread-safe store for jobs and accounts.
///
/// Wraps a single SQLite connection in a `Mutex`. The scheduler loop and the
/// gateway each construct their own `JobStore` over separate connections to
/// the same file, so neither blocks the other on long scans.
pub struct JobStore {
    db: Mutex<Connection>,
}

impl JobStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert a new `pending` job and return its store-assigned id.
    #[instrument(skip(self, job), fields(owner = %job.owner, recipients = job.recipients.len()))]
    pub fn create(&self, job: &NewJob) -> Result<i64> {
        let recipients_json = serde_json::to_string(&job.recipients)?;
        let media_json = if job.media_refs.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&job.media_refs)?)
        };
        let now = chrono::Utc::now().to_rfc3339();

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO jobs (owner, recipients, body, scheduled_for, status, created_at, media_refs)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)",
            rusqlite::params![job.owner, recipients_json, job.body, job.scheduled_for, now, media_json],
        )?;
        let id = db.last_insert_rowid();
        debug!(job_id = id, "job created");
        Ok(id)
    }

    /// Fetch one job by id, returning `None` if it does not exist.
    pub fn get(&self, id: i64) -> Result<Option<ScheduledJob>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, owner, recipients, body, scheduled_for, status, created_at, executed_at, media_refs
             FROM jobs WHERE id = ?1",
            rusqlite::params![id],
            row_to_job,
        ) {
            Ok(job) => Ok(Some(job?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// List jobs, optionally filtered by owner, ascending by `scheduled_for`.
    pub fn list(&self, owner: Option<&str>) -> Result<Vec<ScheduledJob>> {
        let db = self.db.lock().unwrap();
        let mut stmt = match owner {
            Some(_) => db.prepare(
                "SELECT id, owner, recipients, body, scheduled_for, status, created_at, executed_at, media_refs
                 FROM jobs WHERE owner = ?1 ORDER BY scheduled_for ASC",
            )?,
            None => db.prepare(
                "SELECT id, owner, recipients, body, scheduled_for, status, created_at, executed_at, media_refs
                 FROM jobs ORDER BY scheduled_for ASC",
            )?,
        };
        let rows = match owner {
            Some(o) => stmt.query_map(rusqlite::params![o], row_to_job)?,
            None => stmt.query_map([], row_to_job)?,
        };
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row??);
        }
        Ok(jobs)
    }

    /// All `pending` jobs across every owner, ascending by `scheduled_for` —
    /// the scheduler's scan query.
    pub fn list_pending(&self) -> Result<Vec<ScheduledJob>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "SELECT id, owner, recipients, body, scheduled_for, status, created_at, executed_at, media_refs
             FROM jobs WHERE status = 'pending' ORDER BY scheduled_for ASC",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row??);
        }
        Ok(jobs)
    }

    /// Transition a `pending` job to a terminal status, stamping
    /// `executed_at` exactly once.
    ///
    /// Returns `false` when the job was already terminal (or gone) — the
    /// guard that makes the pending→terminal transition happen at most once
    /// even when the scheduler races `execute_now`.
    #[instrument(skip(self), fields(job_id = id, status = %status))]
    pub fn mark_terminal(&self, id: i64, status: JobStatus, executed_at: &str) -> Result<bool> {
        debug_assert!(status.is_terminal());
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE jobs SET status = ?1, executed_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            rusqlite::params![status.to_string(), executed_at, id],
        )?;
        Ok(changed > 0)
    }

    /// Replace a job's `media_refs` column — the metadata half of the media
    /// staging two-phase commit (directory rename is the other half).
    pub fn update_media_refs(&self, id: i64, media_refs: &[MediaRef]) -> Result<()> {
        let json = serde_json::to_string(media_refs)?;
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE jobs SET media_refs = ?1 WHERE id = ?2",
            rusqlite::params![json, id],
        )?;
        if changed == 0 {
            return Err(StoreError::JobNotFound { id });
        }
        Ok(())
    }

    /// Delete a job only if `owner` matches — prevents cross-account deletion.
    #[instrument(skip(self), fields(job_id = id, owner))]
    pub fn delete(&self, id: i64, owner: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "DELETE FROM jobs WHERE id = ?1 AND owner = ?2",
            rusqlite::params![id, owner],
        )?;
        Ok(changed > 0)
    }

    /// Status counts for one owner's jobs.
    pub fn stats(&self, owner: &str) -> Result<JobStats> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT status, COUNT(*) FROM jobs WHERE owner = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(rusqlite::params![owner], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = JobStats::default();
        for row in rows {
            let (status, count) = row?;
            let count = count as usize;
            match status.as_str() {
                "pending" => stats.pending = count,
                "sent" => stats.sent = count,
                "failed" => stats.failed = count,
                _ => {}
            }
            stats.total += count;
        }
        Ok(stats)
    }

    // ── accounts ────────────────────────────────────────────────────────────

    /// Upsert credentials for an account after successful authentication.
    pub fn save_account(&self, account: &str, api_id: &str, api_hash: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR REPLACE INTO accounts (account, api_id, api_hash, created_at, last_active)
             VALUES (?1, ?2, ?3, COALESCE(
                 (SELECT created_at FROM accounts WHERE account = ?1), ?4), ?4)",
            rusqlite::params![account, api_id, api_hash, now],
        )?;
        Ok(())
    }

    /// Every saved account — the startup session-restore set.
    pub fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT account, api_id, api_hash, last_active FROM accounts ORDER BY account",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AccountRecord {
                account: row.get(0)?,
                api_id: row.get(1)?,
                api_hash: row.get(2)?,
                last_active: row.get(3)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Bump `last_active` for an account.
    pub fn touch_account(&self, account: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE accounts SET last_active = ?1 WHERE account = ?2",
            rusqlite::params![now, account],
        )?;
        Ok(())
    }
}

/// Map a SQLite row to a `ScheduledJob`. JSON column decoding is deferred to
/// the caller's error type, hence the nested `Result`.
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<ScheduledJob>> {
    let recipients_json: String = row.get(2)?;
    let status_str: String = row.get(5)?;
    let media_json: Option<String> = row.get(8)?;

    Ok((|| -> Result<ScheduledJob> {
        let recipients: Vec<Recipient> = serde_json::from_str(&recipients_json)?;
        let media_refs: Vec<MediaRef> = match media_json {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let status: JobStatus = status_str
            .parse()
            .map_err(|_| StoreError::Database(rusqlite::Error::InvalidQuery))?;
        Ok(ScheduledJob {
            id: row.get(0)?,
            owner: row.get(1)?,
            recipients,
            body: row.get(3)?,
            scheduled_for: row.get(4)?,
            status,
            created_at: row.get(6)?,
            executed_at: row.get(7)?,
            media_refs,
        })
    })())
}
