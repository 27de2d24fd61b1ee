//! SQLite-backed `EventLog`: the durable alternative to
//! [`crate::memory::InMemoryEventLog`].

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::traits::{EventLog, LogRow, Offset, TaggedEvent, is_snapshot_type};

pub struct SqliteEventLog {
    conn: Mutex<Connection>,
}

impl SqliteEventLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().expect("event log connection poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                session_id TEXT NOT NULL,
                offset INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                payload BLOB NOT NULL,
                created_at_millis INTEGER NOT NULL,
                PRIMARY KEY (session_id, offset)
            );
            CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at_millis);",
        )?;
        Ok(())
    }

    fn row_to_log_row(row: &rusqlite::Row) -> rusqlite::Result<LogRow> {
        Ok(LogRow {
            session_id: row.get(0)?,
            offset: row.get(1)?,
            event_type: row.get(2)?,
            payload: row.get(3)?,
            created_at_millis: row.get(4)?,
        })
    }
}

#[async_trait]
impl<E> EventLog<E> for SqliteEventLog
where
    E: TaggedEvent + Serialize + Send + Sync + 'static,
{
    async fn append(&self, session_id: &str, offset: Offset, event: &E) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let event_type = event.type_tag().to_string();
        let created_at_millis = chrono::Utc::now().timestamp_millis();
        let session_id = session_id.to_string();

        let conn = self.conn.lock().expect("event log connection poisoned");
        let result = conn.execute(
            "INSERT INTO events (session_id, offset, event_type, payload, created_at_millis)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, offset, event_type, payload, created_at_millis],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateOffset { session_id, offset })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_from(
        &self,
        session_id: &str,
        from_offset_exclusive: Offset,
    ) -> Result<Vec<LogRow>> {
        let conn = self.conn.lock().expect("event log connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT session_id, offset, event_type, payload, created_at_millis
             FROM events WHERE session_id = ?1 AND offset > ?2 ORDER BY offset ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id, from_offset_exclusive], Self::row_to_log_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn latest_offset(&self, session_id: &str) -> Result<Offset> {
        let conn = self.conn.lock().expect("event log connection poisoned");
        let offset: Option<Offset> = conn
            .query_row(
                "SELECT MAX(offset) FROM events WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(offset.unwrap_or(-1))
    }

    async fn last_full_or_done(&self, session_id: &str) -> Result<Option<LogRow>> {
        let conn = self.conn.lock().expect("event log connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT session_id, offset, event_type, payload, created_at_millis
             FROM events WHERE session_id = ?1 AND event_type IN ('full', 'done')
             ORDER BY offset DESC LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![session_id], Self::row_to_log_row)
            .optional()?;
        debug_assert!(row.as_ref().is_none_or(|r| is_snapshot_type(&r.event_type)));
        Ok(row)
    }

    async fn cleanup(&self, older_than_millis: i64) -> Result<u64> {
        let conn = self.conn.lock().expect("event log connection poisoned");
        let removed = conn.execute(
            "DELETE FROM events WHERE created_at_millis < ?1",
            params![older_than_millis],
        )?;
        Ok(removed as u64)
    }
}
