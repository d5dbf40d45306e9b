use rusqlite::Connection;

use crate::error::Result;

/// Initialise the courier schema in `conn`.
///
/// Creates the `jobs` and `accounts` tables (idempotent) and an index on
/// `(status, scheduled_for)` so the scheduler's polling query stays cheap
/// with a large job history.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            owner         TEXT    NOT NULL,
            recipients    TEXT    NOT NULL,   -- JSON array of {identifier, name}
            body          TEXT    NOT NULL,
            scheduled_for TEXT    NOT NULL,
            status        TEXT    NOT NULL DEFAULT 'pending',
            created_at    TEXT    NOT NULL,
            executed_at   TEXT,               -- set once, at the terminal transition
            media_refs    TEXT                -- JSON array or NULL for text-only jobs
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs (status, scheduled_for);
        CREATE INDEX IF NOT EXISTS idx_jobs_owner ON jobs (owner);

        CREATE TABLE IF NOT EXISTS accounts (
            account     TEXT NOT NULL PRIMARY KEY,
            api_id      TEXT NOT NULL,
            api_hash    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            last_active TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}
