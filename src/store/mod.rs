//! Durable run state, backed by SQLite.
//!
//! Two tables: `unsubscribe_record` holds one row per processed message,
//! `sender_debounce` holds the most recent successful unsubscribe per
//! sender. All writes commit synchronously; the connection is serialized
//! behind a mutex, which is sufficient at the concurrency levels the
//! orchestrator runs at.

use crate::core::error::Result;
use crate::core::models::{RecordStatus, SenderDebounceRecord, UnsubscribeRecord};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS unsubscribe_record (
    message_id  TEXT PRIMARY KEY,
    locator     TEXT,
    raw_header  TEXT,
    status      TEXT NOT NULL,
    error       TEXT,
    updated_at  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS sender_debounce (
    sender               TEXT PRIMARY KEY,
    last_unsubscribed_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_record_status ON unsubscribe_record (status);
";

/// Handle to the state database. Cheap to share behind an `Arc`.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Opens (creating if necessary) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(target: "store", path = %path.display(), "state database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Debounce check: a message warrants an attempt only if its sender has
    /// no recorded unsubscribe at or after the message's receive time.
    pub fn should_attempt(&self, sender: &str, received_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock();
        let last: Option<i64> = conn
            .query_row(
                "SELECT last_unsubscribed_at FROM sender_debounce WHERE sender = ?1",
                params![sender],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match last {
            Some(ts) => ts < received_at.timestamp(),
            None => true,
        })
    }

    /// Records a successful unsubscribe for a sender. The stored timestamp
    /// never moves backwards, so out-of-order completions cannot reopen the
    /// debounce window.
    pub fn record_success(&self, sender: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sender_debounce (sender, last_unsubscribed_at)
             VALUES (?1, ?2)
             ON CONFLICT (sender) DO UPDATE SET
               last_unsubscribed_at = MAX(excluded.last_unsubscribed_at, last_unsubscribed_at)",
            params![sender, at.timestamp()],
        )?;
        Ok(())
    }

    /// Inserts or updates the record for a message. A `None` locator never
    /// erases a previously stored one.
    pub fn upsert_record(
        &self,
        message_id: &str,
        locator: Option<&str>,
        raw_header: Option<&str>,
        status: RecordStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO unsubscribe_record (message_id, locator, raw_header, status, error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (message_id) DO UPDATE SET
               locator    = COALESCE(excluded.locator, locator),
               raw_header = COALESCE(excluded.raw_header, raw_header),
               status     = excluded.status,
               error      = excluded.error,
               updated_at = excluded.updated_at",
            params![
                message_id,
                locator,
                raw_header,
                status.as_str(),
                error,
                Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }

    /// Moves a message to a terminal (or refreshed) status, optionally
    /// overwriting the locator with the one that actually worked.
    pub fn update_status(
        &self,
        message_id: &str,
        status: RecordStatus,
        working_locator: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE unsubscribe_record SET
               status     = ?2,
               locator    = COALESCE(?3, locator),
               error      = ?4,
               updated_at = ?5
             WHERE message_id = ?1",
            params![
                message_id,
                status.as_str(),
                working_locator,
                error,
                Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }

    /// The debounce marker for a sender, if one exists.
    pub fn get_debounce(&self, sender: &str) -> Result<Option<SenderDebounceRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT sender, last_unsubscribed_at FROM sender_debounce WHERE sender = ?1",
                params![sender],
                |row| {
                    let ts: i64 = row.get(1)?;
                    Ok(SenderDebounceRecord {
                        sender_address: row.get(0)?,
                        last_unsubscribed_at: Utc
                            .timestamp_opt(ts, 0)
                            .single()
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_record(&self, message_id: &str) -> Result<Option<UnsubscribeRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT message_id, locator, raw_header, status, error, updated_at
                 FROM unsubscribe_record WHERE message_id = ?1",
                params![message_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// All records with the given status, most recently updated first.
    pub fn list_by_status(&self, status: RecordStatus) -> Result<Vec<UnsubscribeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT message_id, locator, raw_header, status, error, updated_at
             FROM unsubscribe_record WHERE status = ?1
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![status.as_str()], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnsubscribeRecord> {
    let status_raw: String = row.get(3)?;
    let updated: i64 = row.get(5)?;
    Ok(UnsubscribeRecord {
        message_id: row.get(0)?,
        locator: row.get(1)?,
        raw_header: row.get(2)?,
        status: RecordStatus::parse(&status_raw).unwrap_or(RecordStatus::Failed),
        error: row.get(4)?,
        updated_at: Utc
            .timestamp_opt(updated, 0)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debounce_window() {
        let store = StateStore::in_memory().unwrap();
        let now = Utc::now();

        // Unknown sender: always attempt.
        assert!(store.should_attempt("a@x.com", now).unwrap());

        store.record_success("a@x.com", now).unwrap();
        // Older or equal messages are debounced.
        assert!(!store.should_attempt("a@x.com", now).unwrap());
        assert!(!store
            .should_attempt("a@x.com", now - Duration::hours(1))
            .unwrap());
        // A strictly newer message attempts again.
        assert!(store
            .should_attempt("a@x.com", now + Duration::hours(1))
            .unwrap());
    }

    #[test]
    fn test_debounce_timestamp_monotonic() {
        let store = StateStore::in_memory().unwrap();
        let now = Utc::now();
        store.record_success("a@x.com", now).unwrap();
        // A stale completion must not move the marker backwards.
        store
            .record_success("a@x.com", now - Duration::hours(2))
            .unwrap();
        assert!(!store.should_attempt("a@x.com", now).unwrap());
    }

    #[test]
    fn test_get_debounce() {
        let store = StateStore::in_memory().unwrap();
        assert!(store.get_debounce("a@x.com").unwrap().is_none());

        let now = Utc::now();
        store.record_success("a@x.com", now).unwrap();
        let record = store.get_debounce("a@x.com").unwrap().unwrap();
        assert_eq!(record.sender_address, "a@x.com");
        assert_eq!(record.last_unsubscribed_at.timestamp(), now.timestamp());
    }

    #[test]
    fn test_record_round_trip() {
        let store = StateStore::in_memory().unwrap();
        store
            .upsert_record(
                "m1",
                Some("https://a.com/unsub"),
                Some("<https://a.com/unsub>"),
                RecordStatus::Pending,
                None,
            )
            .unwrap();

        let record = store.get_record("m1").unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.locator.as_deref(), Some("https://a.com/unsub"));
        assert_eq!(record.raw_header.as_deref(), Some("<https://a.com/unsub>"));
        assert!(record.error.is_none());

        assert!(store.get_record("missing").unwrap().is_none());
    }

    #[test]
    fn test_null_locator_never_erases() {
        let store = StateStore::in_memory().unwrap();
        store
            .upsert_record("m1", Some("https://a.com/u"), None, RecordStatus::Pending, None)
            .unwrap();
        store
            .upsert_record("m1", None, None, RecordStatus::Failed, Some("boom"))
            .unwrap();

        let record = store.get_record("m1").unwrap().unwrap();
        assert_eq!(record.locator.as_deref(), Some("https://a.com/u"));
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_update_status_overwrites_with_working_locator() {
        let store = StateStore::in_memory().unwrap();
        store
            .upsert_record("m1", Some("https://a.com/u"), None, RecordStatus::Pending, None)
            .unwrap();
        store
            .update_status("m1", RecordStatus::Success, Some("https://b.com/u"), None)
            .unwrap();

        let record = store.get_record("m1").unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Success);
        assert_eq!(record.locator.as_deref(), Some("https://b.com/u"));

        // Without a working locator, the stored one is kept.
        store
            .update_status("m1", RecordStatus::Failed, None, Some("later failure"))
            .unwrap();
        let record = store.get_record("m1").unwrap().unwrap();
        assert_eq!(record.locator.as_deref(), Some("https://b.com/u"));
    }

    #[test]
    fn test_list_by_status() {
        let store = StateStore::in_memory().unwrap();
        store
            .upsert_record("m1", None, None, RecordStatus::Failed, Some("x"))
            .unwrap();
        store
            .upsert_record("m2", None, None, RecordStatus::Success, None)
            .unwrap();
        store
            .upsert_record("m3", None, None, RecordStatus::Failed, Some("y"))
            .unwrap();

        let failed = store.list_by_status(RecordStatus::Failed).unwrap();
        let ids: Vec<&str> = failed.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(failed.len(), 2);
        assert!(ids.contains(&"m1") && ids.contains(&"m3"));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = StateStore::open(&path).unwrap();
            store.record_success("a@x.com", Utc::now()).unwrap();
        }
        // Reopen and confirm persistence.
        let store = StateStore::open(&path).unwrap();
        assert!(!store.should_attempt("a@x.com", Utc::now() - Duration::hours(1)).unwrap());
    }
}
