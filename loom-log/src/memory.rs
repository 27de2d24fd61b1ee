//! In-memory `EventLog` implementation.
//!
//! Stores rows per session in a `Vec`, used by tests and by `loom serve
//! --ephemeral`. Durability does not outlive the process; use
//! [`crate::sqlite::SqliteEventLog`] for a durable backend.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::traits::{EventLog, LogRow, Offset, TaggedEvent, is_snapshot_type};

pub struct InMemoryEventLog {
    rows: RwLock<HashMap<String, Vec<LogRow>>>,
}

impl InMemoryEventLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E> EventLog<E> for InMemoryEventLog
where
    E: TaggedEvent + Serialize + Send + Sync + 'static,
{
    async fn append(&self, session_id: &str, offset: Offset, event: &E) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let row = LogRow {
            session_id: session_id.to_string(),
            offset,
            event_type: event.type_tag().to_string(),
            payload,
            created_at_millis: now_millis(),
        };

        let mut rows = self.rows.write().await;
        let session_rows = rows.entry(session_id.to_string()).or_default();
        if session_rows.iter().any(|r| r.offset == offset) {
            return Err(Error::DuplicateOffset {
                session_id: session_id.to_string(),
                offset,
            });
        }
        session_rows.push(row);
        Ok(())
    }

    async fn read_from(
        &self,
        session_id: &str,
        from_offset_exclusive: Offset,
    ) -> Result<Vec<LogRow>> {
        let rows = self.rows.read().await;
        let mut out: Vec<LogRow> = rows
            .get(session_id)
            .map(|v| {
                v.iter()
                    .filter(|r| r.offset > from_offset_exclusive)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|r| r.offset);
        Ok(out)
    }

    async fn latest_offset(&self, session_id: &str) -> Result<Offset> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(session_id)
            .and_then(|v| v.iter().map(|r| r.offset).max())
            .unwrap_or(-1))
    }

    async fn last_full_or_done(&self, session_id: &str) -> Result<Option<LogRow>> {
        let rows = self.rows.read().await;
        Ok(rows.get(session_id).and_then(|v| {
            v.iter()
                .filter(|r| is_snapshot_type(&r.event_type))
                .max_by_key(|r| r.offset)
                .cloned()
        }))
    }

    async fn cleanup(&self, older_than_millis: i64) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let mut removed = 0u64;
        for session_rows in rows.values_mut() {
            let before = session_rows.len();
            session_rows.retain(|r| r.created_at_millis >= older_than_millis);
            removed += (before - session_rows.len()) as u64;
        }
        Ok(removed)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
